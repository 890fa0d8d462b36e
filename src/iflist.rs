use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::debug;
use rustix::fs::Dir;

use crate::constants;
use crate::fs::{JoinRelative, path_exists};
use crate::system::LinkLayerSource;

/// Lists local network interface names. The order is whatever the OS hands
/// back.
pub struct InterfaceLister {
    sys_class_net: PathBuf,
    fallback: Option<Arc<dyn LinkLayerSource>>,
}

impl InterfaceLister {
    pub fn new(sys_class_net: PathBuf, fallback: Option<Arc<dyn LinkLayerSource>>) -> Self {
        Self {
            sys_class_net,
            fallback,
        }
    }

    pub fn system(root: &Path, fallback: Option<Arc<dyn LinkLayerSource>>) -> Self {
        Self::new(root.join_relative(constants::DIR_SYS_CLASS_NET), fallback)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        if path_exists(&self.sys_class_net)? {
            return read_dir_names(&self.sys_class_net);
        }
        let source = self.fallback.as_ref().ok_or_else(|| {
            anyhow!(
                "{} does not exist and no interface library is available",
                self.sys_class_net.to_string_lossy()
            )
        })?;
        debug!(
            "{} not found, listing interfaces from the interface library",
            self.sys_class_net.to_string_lossy()
        );
        let mut names: Vec<String> = Vec::new();
        for entry in source.entries()? {
            if !names.contains(&entry.name) {
                names.push(entry.name);
            }
        }
        Ok(names)
    }
}

fn read_dir_names(path: &Path) -> Result<Vec<String>> {
    let path_str = path.to_string_lossy();
    let fd = File::open(path).map_err(|e| anyhow!("unable to open {}: {}", path_str, e))?;
    let dir = Dir::read_from(&fd)
        .map_err(|e| anyhow!("unable to read from directory {}: {}", path_str, e))?;
    let mut names = Vec::new();
    for entry_res in dir {
        let entry = entry_res
            .map_err(|e| anyhow!("unable to read directory entry in {}: {}", path_str, e))?;
        let name = entry.file_name().to_string_lossy();
        if name == "." || name == ".." {
            continue;
        }
        names.push(name.into_owned());
    }
    Ok(names)
}
