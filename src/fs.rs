use std::{
    ffi::OsString,
    fs::{File, create_dir, remove_file, rename, symlink_metadata},
    io::ErrorKind,
    path::{MAIN_SEPARATOR_STR, Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

static BACKUP_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn mkdir_p<P: AsRef<Path>>(path: P) -> Result<()> {
    let path_str = path.as_ref().to_string_lossy();
    for dir in descending_dirs(&path_str) {
        match create_dir(&dir) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => (),
            Err(e) => return Err(anyhow!("unable to create directory {}: {}", dir, e)),
            Ok(_) => debug!("Created directory {}", &dir),
        }
    }
    Ok(())
}

// Given a path, return a list of it and its parents in descending order.
// For example, "/a/b/c", returns the Vector ["/a", "/a/b", "/a/b/c"].
fn descending_dirs(path: &str) -> Vec<String> {
    let dirs = path.split("/").collect::<Vec<&str>>();
    (1..=dirs.len())
        .map(|i| dirs[..i].join("/"))
        .filter(|s| !s.is_empty())
        .collect()
}

// The behavior of Path::join is surprising, as it does not actually join paths
// when the path argument is absolute, rather it returns the absolute one. This
// version joins the paths as expected.
pub trait JoinRelative {
    fn join_relative<P: AsRef<Path>>(&self, path: P) -> PathBuf;
}

impl JoinRelative for Path {
    fn join_relative<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let p = path.as_ref();
        match p.strip_prefix(MAIN_SEPARATOR_STR) {
            Ok(relative) => Path::join(self, relative),
            Err(_) => Path::join(self, p),
        }
    }
}

pub fn path_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    match symlink_metadata(path.as_ref()) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(anyhow!(
            "unable to stat {}: {}",
            path.as_ref().to_string_lossy(),
            e
        )),
    }
}

fn backup_path(path: &Path, stamp: &str, seq: u64) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}.{}.bak", stamp, seq));
    PathBuf::from(name)
}

/// Moves `path` aside to `<path>.<timestamp>.<seq>.bak`.
///
/// Returns the backup location, or `None` when there was nothing to back up.
pub fn backup_file<P: AsRef<Path>>(path: P) -> Result<Option<PathBuf>> {
    let p = path.as_ref();
    if !path_exists(p)? {
        debug!("Nothing to back up at {}", p.to_string_lossy());
        return Ok(None);
    }

    let now: DateTime<Utc> = SystemTime::now().into();
    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let dest = loop {
        let seq = BACKUP_SEQ.fetch_add(1, Ordering::Relaxed);
        let candidate = backup_path(p, &stamp, seq);
        if !path_exists(&candidate)? {
            break candidate;
        }
    };

    rename(p, &dest).context(format!(
        "unable to rename {} to {}",
        p.to_string_lossy(),
        dest.to_string_lossy()
    ))?;
    info!(
        "Backed up {} to {}",
        p.to_string_lossy(),
        dest.to_string_lossy()
    );
    Ok(Some(dest))
}

// Temporary file that is removed unless it was moved into place.
struct PendingFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = remove_file(&self.path);
        }
    }
}

pub fn atomic_write<P: AsRef<Path>>(
    path: P,
    write: impl FnOnce(&File) -> Result<()>,
) -> Result<()> {
    let p = path.as_ref();
    let p_str = p.to_string_lossy();

    let dir_name = match p.parent() {
        Some(d) if d.as_os_str().is_empty() => Path::new("."),
        Some(d) => d,
        None => return Err(anyhow!("invalid path {}", p_str)),
    };
    let file_name = p
        .file_name()
        .ok_or_else(|| anyhow!("invalid path {}", p_str))?;
    let mut pending = PendingFile {
        path: dir_name.join(format!(".{}.tmp", file_name.to_string_lossy())),
        committed: false,
    };

    {
        let f = File::create(&pending.path)
            .context(format!("unable to create {}", pending.path.to_string_lossy()))?;
        write(&f).context(format!("unable to write {}", p_str))?;
        f.sync_all().context(format!("unable to sync {}", p_str))?;
    }

    rename(&pending.path, p).context(format!(
        "unable to rename {} to {}",
        pending.path.to_string_lossy(),
        p_str
    ))?;
    pending.committed = true;

    let dir_name_str = dir_name.to_string_lossy();
    let dir = File::open(dir_name).context(format!("unable to open directory {}", dir_name_str))?;
    dir.sync_all()
        .context(format!("unable to sync directory {}", dir_name_str))
}

/// Backs up `path` and atomically writes new content in its place. If the
/// write fails, the backup is moved back.
pub fn replace_file<P: AsRef<Path>>(
    path: P,
    write: impl FnOnce(&File) -> Result<()>,
) -> Result<Option<PathBuf>> {
    let p = path.as_ref();
    let backup = backup_file(p)?;
    if let Err(e) = atomic_write(p, write) {
        if let Some(b) = &backup {
            match rename(b, p) {
                Ok(()) => warn!("Restored {} after failed write", p.to_string_lossy()),
                Err(re) => warn!(
                    "Unable to restore {} from {}: {}",
                    p.to_string_lossy(),
                    b.to_string_lossy(),
                    re
                ),
            }
        }
        return Err(e);
    }
    Ok(backup)
}
