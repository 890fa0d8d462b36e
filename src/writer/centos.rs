use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::info;
use rustix::fs::Dir;

use super::{dotted, install, join_lines, prefix_len};
use crate::constants;
use crate::fs::{JoinRelative, backup_file, mkdir_p};
use crate::model::{HostNetworkSnapshot, Interface};

/// Red Hat style `ifcfg-*` and `route-*` files plus `/etc/sysconfig/network`.
pub struct CentosWriter {
    scripts_dir: PathBuf,
    network_file: PathBuf,
}

impl CentosWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            scripts_dir: root.join_relative(constants::DIR_SYSCONFIG_NETWORK_SCRIPTS),
            network_file: root.join_relative(constants::FILE_ETC_SYSCONFIG_NETWORK),
        }
    }

    pub fn render(&self, hostname: &str, snapshot: &HostNetworkSnapshot) -> Result<()> {
        let mut artifacts = Vec::new();
        for (ifname, iface) in &snapshot.interfaces {
            let ifcfg = self
                .scripts_dir
                .join(format!("{}{}", constants::PREFIX_IFCFG, ifname));
            artifacts.push((ifcfg, Some(render_ifcfg(ifname, iface)?)));
            let routes = self
                .scripts_dir
                .join(format!("{}{}", constants::PREFIX_ROUTE, ifname));
            artifacts.push((routes, render_routes(iface)));
        }

        mkdir_p(&self.scripts_dir)?;
        for stale in stale_ifcfg_files(&self.scripts_dir, &snapshot.present)? {
            info!("Moving aside {} for a missing interface", stale.to_string_lossy());
            backup_file(&stale)?;
        }
        for (path, content) in artifacts {
            match content {
                Some(c) => install(&path, &c)?,
                None => {
                    backup_file(&path)?;
                }
            }
        }
        install(&self.network_file, &render_network(hostname))
    }
}

pub fn render_ifcfg(ifname: &str, iface: &Interface) -> Result<String> {
    let mut lines = vec![
        constants::HEADER_GENERATED.to_string(),
        String::new(),
        format!("# Label {}", iface.label),
        "BOOTPROTO=static".to_string(),
        format!("DEVICE={}", ifname),
    ];
    for (i, binding) in iface.ips.iter().enumerate() {
        let suffix = if i == 0 { String::new() } else { i.to_string() };
        lines.push(format!("IPADDR{}={}", suffix, binding.ip));
        lines.push(format!("NETMASK{}={}", suffix, dotted(ifname, &binding.netmask)?));
    }
    if let Some(gateway) = iface.default_gateway() {
        lines.push(format!("GATEWAY={}", gateway));
    }
    if !iface.ip6s.is_empty() {
        lines.push("IPV6INIT=yes".to_string());
        for (i, binding) in iface.ip6s.iter().enumerate() {
            let suffix = if i == 0 { String::new() } else { i.to_string() };
            lines.push(format!(
                "IPV6ADDR{}={}/{}",
                suffix,
                binding.ip,
                prefix_len(ifname, &binding.netmask)?
            ));
        }
        if let Some(gateway) = iface.default_gateway_v6() {
            lines.push(format!("IPV6_DEFAULTGW={}%{}", gateway, ifname));
        }
    }
    for (i, server) in iface.dns.iter().enumerate() {
        lines.push(format!("DNS{}={}", i + 1, server));
    }
    lines.push("ONBOOT=yes".to_string());
    lines.push("NM_CONTROLLED=no".to_string());
    Ok(join_lines(&lines))
}

pub fn render_routes(iface: &Interface) -> Option<String> {
    if iface.routes.is_empty() {
        return None;
    }
    let lines: Vec<String> = iface
        .routes
        .iter()
        .enumerate()
        .flat_map(|(i, r)| {
            [
                format!("ADDRESS{}={}", i, r.route),
                format!("NETMASK{}={}", i, r.netmask),
                format!("GATEWAY{}={}", i, r.gateway),
            ]
        })
        .collect();
    Some(join_lines(&lines))
}

pub fn render_network(hostname: &str) -> String {
    join_lines(&[
        "NETWORKING=yes".to_string(),
        "NOZEROCONF=yes".to_string(),
        "NETWORKING_IPV6=yes".to_string(),
        format!("HOSTNAME={}", hostname),
    ])
}

// ifcfg files whose interface no longer exists. Backups and the loopback
// file are never stale.
fn stale_ifcfg_files(dir: &Path, present: &BTreeSet<String>) -> Result<Vec<PathBuf>> {
    let dir_str = dir.to_string_lossy();
    let fd = File::open(dir).map_err(|e| anyhow!("unable to open {}: {}", dir_str, e))?;
    let entries = Dir::read_from(&fd)
        .map_err(|e| anyhow!("unable to read from directory {}: {}", dir_str, e))?;
    let mut stale = Vec::new();
    for entry_res in entries {
        let entry = entry_res
            .map_err(|e| anyhow!("unable to read directory entry in {}: {}", dir_str, e))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(suffix) = file_name.strip_prefix(constants::PREFIX_IFCFG) else {
            continue;
        };
        if suffix.ends_with(".bak") {
            continue;
        }
        let base = suffix.split(':').next().unwrap_or(suffix);
        if base == "lo" || present.contains(base) {
            continue;
        }
        stale.push(dir.join(&file_name));
    }
    stale.sort();
    Ok(stale)
}
