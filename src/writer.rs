//! Renders a [`HostNetworkSnapshot`] into the network configuration dialect of
//! the running OS family.
//!
//! Every writer backs up an existing artifact before replacing it and renders
//! its output deterministically, so reconciling unchanged input twice produces
//! identical files.

pub mod centos;
pub mod debian;
pub mod freebsd;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::fs::{mkdir_p, replace_file};
use crate::model::HostNetworkSnapshot;
use crate::netmask::Netmask;
use crate::system::Platform;

pub use centos::CentosWriter;
pub use debian::DebianWriter;
pub use freebsd::FreeBsdWriter;

pub enum OsWriter {
    Default,
    Centos(CentosWriter),
    Debian(DebianWriter),
    FreeBsd(FreeBsdWriter),
}

impl OsWriter {
    pub fn for_platform(platform: Platform, root: &Path) -> Self {
        match platform {
            Platform::Centos => Self::Centos(CentosWriter::new(root)),
            Platform::Debian => Self::Debian(DebianWriter::new(root)),
            Platform::FreeBsd => Self::FreeBsd(FreeBsdWriter::new(root)),
            Platform::Default => Self::Default,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Default => Platform::Default,
            Self::Centos(_) => Platform::Centos,
            Self::Debian(_) => Platform::Debian,
            Self::FreeBsd(_) => Platform::FreeBsd,
        }
    }

    pub fn render(&self, hostname: &str, snapshot: &HostNetworkSnapshot) -> Result<()> {
        match self {
            Self::Default => {
                warn!(
                    "No network configuration writer for this platform, leaving {} interface(s) unconfigured",
                    snapshot.interfaces.len()
                );
                Ok(())
            }
            Self::Centos(w) => w.render(hostname, snapshot),
            Self::Debian(w) => w.render(hostname, snapshot),
            Self::FreeBsd(w) => w.render(hostname, snapshot),
        }
    }

    /// Commands that make the OS pick up rewritten configuration, run in
    /// order.
    pub fn restart_commands(&self) -> Vec<Vec<String>> {
        let commands: Vec<&[&str]> = match self {
            Self::Default => vec![],
            Self::Centos(_) => vec![&["service", "network", "restart"][..]],
            Self::Debian(_) => vec![&["service", "networking", "restart"][..]],
            Self::FreeBsd(_) => vec![
                &["service", "netif", "restart"][..],
                &["service", "routing", "restart"][..],
            ],
        };
        commands
            .iter()
            .map(|argv| argv.iter().map(|s| s.to_string()).collect())
            .collect()
    }
}

/// Name of the alias sub-interface carrying address number `index`.
pub(crate) fn alias_name(ifname: &str, index: usize) -> String {
    if index == 0 {
        ifname.to_string()
    } else {
        format!("{}:{}", ifname, index)
    }
}

pub(crate) fn dotted(ifname: &str, netmask: &Netmask) -> Result<String> {
    netmask
        .dotted()
        .map(|m| m.to_string())
        .ok_or_else(|| anyhow!("invalid IPv4 netmask {} on {}", netmask, ifname))
}

pub(crate) fn prefix_len(ifname: &str, netmask: &Netmask) -> Result<u8> {
    netmask
        .prefix_len()
        .ok_or_else(|| anyhow!("invalid netmask {} on {}", netmask, ifname))
}

pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Backs up and replaces one configuration artifact.
pub(crate) fn install(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        mkdir_p(parent)?;
    }
    replace_file(path, |mut f| {
        f.write_all(content.as_bytes())?;
        Ok(())
    })
    .context(format!("unable to replace {}", path.to_string_lossy()))?;
    info!("Wrote {}", path.to_string_lossy());
    Ok(())
}
