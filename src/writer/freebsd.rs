use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{dotted, install, join_lines, prefix_len};
use crate::constants;
use crate::fs::JoinRelative;
use crate::model::{HostNetworkSnapshot, Interface};

/// `/etc/rc.conf.local`, rewritten as a whole on every pass.
pub struct FreeBsdWriter {
    rc_conf: PathBuf,
}

impl FreeBsdWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            rc_conf: root.join_relative(constants::FILE_ETC_RC_CONF_LOCAL),
        }
    }

    pub fn render(&self, hostname: &str, snapshot: &HostNetworkSnapshot) -> Result<()> {
        install(&self.rc_conf, &render_rc_conf(hostname, snapshot)?)
    }
}

pub fn render_rc_conf(hostname: &str, snapshot: &HostNetworkSnapshot) -> Result<String> {
    let mut lines = vec![
        constants::HEADER_GENERATED.to_string(),
        format!("hostname=\"{}\"", hostname),
    ];
    let mut lans = Vec::new();
    let mut ipv6_interfaces = Vec::new();
    for (ifname, iface) in &snapshot.interfaces {
        render_interface(&mut lines, &mut lans, ifname, iface)?;
        if !iface.ip6s.is_empty() {
            ipv6_interfaces.push(ifname.as_str());
        }
    }
    if !ipv6_interfaces.is_empty() {
        lines.push("ipv6_enable=\"YES\"".to_string());
        lines.push(format!(
            "ipv6_network_interfaces=\"{}\"",
            ipv6_interfaces.join(" ")
        ));
    }
    if !lans.is_empty() {
        lines.push(format!("static_routes=\"{}\"", lans.join(" ")));
    }
    Ok(join_lines(&lines))
}

fn render_interface(
    lines: &mut Vec<String>,
    lans: &mut Vec<String>,
    ifname: &str,
    iface: &Interface,
) -> Result<()> {
    lines.push(format!("# Label {}", iface.label));
    for (i, binding) in iface.ips.iter().enumerate() {
        lines.push(format!(
            "ifconfig_{}_alias{}=\"{} netmask {} up\"",
            ifname,
            i,
            binding.ip,
            dotted(ifname, &binding.netmask)?
        ));
    }
    // IPv6 aliases share the counter with the IPv4 ones.
    let offset = iface.ips.len();
    for (i, binding) in iface.ip6s.iter().enumerate() {
        lines.push(format!(
            "ifconfig_{}_alias{}=\"inet6 {} prefixlen {} up\"",
            ifname,
            offset + i,
            binding.ip,
            prefix_len(ifname, &binding.netmask)?
        ));
    }
    if let Some(gateway) = iface.default_gateway() {
        lines.push(format!("defaultrouter=\"{}\"", gateway));
    }
    if let Some(gateway) = iface.default_gateway_v6() {
        lines.push(format!("ipv6_defaultrouter=\"{}%{}\"", gateway, ifname));
    }
    for route in &iface.routes {
        let lan = format!("lan{}", lans.len());
        lines.push(format!(
            "route_{}=\"-net {} -netmask {} {}\"",
            lan, route.route, route.netmask, route.gateway
        ));
        lans.push(lan);
    }
    Ok(())
}
