use std::process::Command;

use anyhow::{Result, anyhow};
use log::{debug, warn};

use crate::constants;
use crate::model::{Interface, MacAddr};
use crate::system::node_name;

/// Access to the hypervisor's key/value metadata store.
pub trait ControlPlane {
    fn list(&self, path: &str) -> Result<Vec<String>>;
    fn read(&self, path: &str) -> Result<String>;
    fn write(&self, path: &str, value: &str) -> Result<()>;
    fn delete(&self, path: &str) -> Result<()>;
}

/// Typed reads of the network identity data kept under `prefix`.
pub struct ControlPlaneData<'a> {
    client: &'a dyn ControlPlane,
    prefix: String,
}

impl<'a> ControlPlaneData<'a> {
    pub fn new(client: &'a dyn ControlPlane, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn networking_path(&self) -> String {
        format!("{}/{}", self.prefix, constants::CONTROL_PLANE_NETWORKING)
    }

    /// Hardware addresses the control plane has interface records for.
    pub fn list_macs(&self) -> Vec<String> {
        match self.client.list(&self.networking_path()) {
            Ok(keys) => keys.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            Err(e) => {
                warn!("Unable to list interfaces in the control plane: {}", e);
                vec![]
            }
        }
    }

    pub fn get_interface(&self, key: &str) -> Option<Interface> {
        let path = format!("{}/{}", self.networking_path(), key);
        let value = match self.client.read(&path) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unable to read {}: {}", path, e);
                return None;
            }
        };
        match Interface::from_json(&value) {
            Ok(iface) => Some(iface),
            Err(e) => {
                warn!("Ignoring malformed record at {}: {}", path, e);
                None
            }
        }
    }

    /// Every readable interface record. Records whose key does not match the
    /// MAC inside them are kept; the MAC in the record wins.
    pub fn interface_records(&self) -> Vec<Interface> {
        let mut records = Vec::new();
        for key in self.list_macs() {
            let Some(iface) = self.get_interface(&key) else {
                continue;
            };
            if key.parse::<MacAddr>().ok().as_ref() != Some(&iface.mac) {
                debug!("Record {} describes {}", key, iface.mac);
            }
            records.push(iface);
        }
        records
    }

    /// The hostname set by the control plane, or the kernel's node name when
    /// there is none.
    pub fn get_hostname(&self) -> String {
        let path = format!("{}/{}", self.prefix, constants::CONTROL_PLANE_HOSTNAME);
        match self.client.read(&path) {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            Ok(_) => {
                debug!("{} is empty, using the node name", path);
                node_name()
            }
            Err(e) => {
                warn!("Unable to read {}, using the node name: {}", path, e);
                node_name()
            }
        }
    }
}

/// Talks to xenstore through the `xenstore-*` command line tools.
#[derive(Debug, Default)]
pub struct XenstoreCli;

impl XenstoreCli {
    fn exec(&self, tool: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(tool)
            .args(args)
            .output()
            .map_err(|e| anyhow!("unable to run {}: {}", tool, e))?;
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(code) => Err(anyhow!(
                "{} failed with exit code {}: {}",
                tool,
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            None => Err(anyhow!("{} terminated by signal", tool)),
        }
    }
}

impl ControlPlane for XenstoreCli {
    fn list(&self, path: &str) -> Result<Vec<String>> {
        let out = self.exec("xenstore-list", &[path])?;
        Ok(out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn read(&self, path: &str) -> Result<String> {
        let out = self.exec("xenstore-read", &[path])?;
        Ok(out.trim_end_matches('\n').to_string())
    }

    fn write(&self, path: &str, value: &str) -> Result<()> {
        self.exec("xenstore-write", &[path, value]).map(|_| ())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.exec("xenstore-rm", &[path]).map(|_| ())
    }
}
