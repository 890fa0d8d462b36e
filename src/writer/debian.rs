use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{alias_name, dotted, install, join_lines, prefix_len};
use crate::constants;
use crate::fs::JoinRelative;
use crate::model::{HostNetworkSnapshot, Interface, StaticRoute};

/// ifupdown's `/etc/network/interfaces` plus `/etc/hostname`.
pub struct DebianWriter {
    interfaces_file: PathBuf,
    hostname_file: PathBuf,
}

impl DebianWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            interfaces_file: root.join_relative(constants::FILE_ETC_NETWORK_INTERFACES),
            hostname_file: root.join_relative(constants::FILE_ETC_HOSTNAME),
        }
    }

    pub fn render(&self, hostname: &str, snapshot: &HostNetworkSnapshot) -> Result<()> {
        let interfaces = render_interfaces(snapshot)?;
        install(&self.interfaces_file, &interfaces)?;
        install(&self.hostname_file, &format!("{}\n", hostname))
    }
}

pub fn render_interfaces(snapshot: &HostNetworkSnapshot) -> Result<String> {
    let mut lines = vec![
        constants::HEADER_GENERATED.to_string(),
        String::new(),
        "# The loopback network interface".to_string(),
        "auto lo".to_string(),
        "iface lo inet loopback".to_string(),
        String::new(),
    ];
    for (ifname, iface) in &snapshot.interfaces {
        render_interface(&mut lines, ifname, iface)?;
    }
    Ok(join_lines(&lines))
}

fn route_command(action: &str, route: &StaticRoute) -> String {
    format!(
        "\t{} route {} -net {} netmask {} gw {} || true",
        if action == "add" { "post-up" } else { "post-down" },
        action,
        route.route,
        route.netmask,
        route.gateway
    )
}

// DNS servers and route hooks, attached to the first stanza of an interface.
fn push_interface_options(lines: &mut Vec<String>, iface: &Interface) {
    if !iface.dns.is_empty() {
        let servers: Vec<String> = iface.dns.iter().map(|s| s.to_string()).collect();
        lines.push(format!("\tdns-nameservers {}", servers.join(" ")));
    }
    for route in &iface.routes {
        lines.push(route_command("add", route));
        lines.push(route_command("del", route));
    }
}

fn render_interface(lines: &mut Vec<String>, ifname: &str, iface: &Interface) -> Result<()> {
    lines.push(format!("# Label {}", iface.label));
    lines.push(String::new());

    for (i, binding) in iface.ips.iter().enumerate() {
        let name = alias_name(ifname, i);
        lines.push(format!("auto {}", name));
        lines.push(format!("iface {} inet static", name));
        lines.push(format!("\taddress {}", binding.ip));
        lines.push(format!("\tnetmask {}", dotted(ifname, &binding.netmask)?));
        if i == 0 {
            if let Some(gateway) = iface.default_gateway() {
                lines.push(format!("\tgateway {}", gateway));
            }
            push_interface_options(lines, iface);
        }
        lines.push(String::new());
    }

    for (i, binding) in iface.ip6s.iter().enumerate() {
        let name = alias_name(ifname, i);
        // Aliases without an IPv4 stanza have not been marked auto yet.
        if i >= iface.ips.len() {
            lines.push(format!("auto {}", name));
        }
        lines.push(format!("iface {} inet6 static", name));
        lines.push(format!("\taddress {}", binding.ip));
        lines.push(format!("\tnetmask {}", prefix_len(ifname, &binding.netmask)?));
        if i == 0 {
            if let Some(gateway) = iface.default_gateway_v6() {
                lines.push(format!("\tgateway {}", gateway));
            }
            if iface.ips.is_empty() {
                push_interface_options(lines, iface);
            }
        }
        lines.push(String::new());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs::{create_dir_all, read_dir, read_to_string, write};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::test::{eth0, eth1, snapshot};

    const INTERFACES: &str = "\
# Automatically generated, do not edit

# The loopback network interface
auto lo
iface lo inet loopback

# Label public

auto eth0
iface eth0 inet static
\taddress 104.130.4.72
\tnetmask 255.255.255.0
\tgateway 104.130.4.1
\tdns-nameservers 69.20.0.164 69.20.0.196

auto eth0:1
iface eth0:1 inet static
\taddress 104.130.4.73
\tnetmask 255.255.255.0

iface eth0 inet6 static
\taddress 2001:4802:7802:104:be76:4eff:fe20:7572
\tnetmask 64
\tgateway fe80::def

iface eth0:1 inet6 static
\taddress 2001:4802:7802:104:be76:4eff:fe20:7573
\tnetmask 64

# Label private

auto eth1
iface eth1 inet static
\taddress 10.208.227.239
\tnetmask 255.255.224.0
\tpost-up route add -net 10.208.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-down route del -net 10.208.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-up route add -net 10.176.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-down route del -net 10.176.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true

";

    #[test]
    fn test_render_interfaces() {
        let snap = snapshot(vec![("eth1", eth1()), ("eth0", eth0())]);
        assert_eq!(render_interfaces(&snap).unwrap(), INTERFACES);
    }

    #[test]
    fn test_render_single_public_interface() {
        let iface = Interface::from_json(
            r#"{
                "label": "public",
                "mac": "BC:76:4E:20:75:72",
                "ips": [{"ip": "104.130.4.72", "netmask": "255.255.255.0", "gateway": "104.130.4.1"}],
                "gateway": "104.130.4.1"
            }"#,
        )
        .unwrap();
        let text = render_interfaces(&snapshot(vec![("eth0", iface)])).unwrap();
        assert!(text.contains(
            "auto eth0\niface eth0 inet static\n\taddress 104.130.4.72\n\tnetmask 255.255.255.0\n\tgateway 104.130.4.1\n"
        ));
        assert!(!text.contains("eth0:1"));
        assert!(!text.contains("inet6"));
    }

    #[test]
    fn test_render_ipv6_only_interface() {
        let mut iface = eth1();
        iface.ips.clear();
        iface.ip6s = eth0().ip6s;
        iface.dns = eth0().dns;
        let text = render_interfaces(&snapshot(vec![("eth1", iface)])).unwrap();
        assert!(text.ends_with(
            "\
# Label private

auto eth1
iface eth1 inet6 static
\taddress 2001:4802:7802:104:be76:4eff:fe20:7572
\tnetmask 64
\tgateway fe80::def
\tdns-nameservers 69.20.0.164 69.20.0.196
\tpost-up route add -net 10.208.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-down route del -net 10.208.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-up route add -net 10.176.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true
\tpost-down route del -net 10.176.0.0 netmask 255.240.0.0 gw 10.208.224.1 || true

auto eth1:1
iface eth1:1 inet6 static
\taddress 2001:4802:7802:104:be76:4eff:fe20:7573
\tnetmask 64

"
        ));
    }

    #[test]
    fn test_render_more_ipv6_than_ipv4_aliases() {
        let mut iface = eth0();
        iface.ips.truncate(1);
        let text = render_interfaces(&snapshot(vec![("eth0", iface)])).unwrap();
        assert_eq!(text.matches("auto eth0\n").count(), 1);
        assert!(text.contains("auto eth0:1\niface eth0:1 inet6 static\n"));
        assert_eq!(text.matches("dns-nameservers").count(), 1);
    }

    #[test]
    fn test_render_loopback_only() {
        let text = render_interfaces(&HostNetworkSnapshot::default()).unwrap();
        assert!(text.ends_with("auto lo\niface lo inet loopback\n\n"));
    }

    #[test]
    fn test_render_failure_leaves_hostname_alone() {
        let dir = tempfile::tempdir().unwrap();
        create_dir_all(dir.path().join("etc")).unwrap();
        write(dir.path().join("etc/network"), "not a directory\n").unwrap();
        write(dir.path().join("etc/hostname"), "old-name\n").unwrap();
        let writer = DebianWriter::new(dir.path());

        assert!(
            writer
                .render("test-server", &snapshot(vec![("eth0", eth0())]))
                .is_err()
        );
        assert_eq!(
            read_to_string(dir.path().join("etc/hostname")).unwrap(),
            "old-name\n"
        );
        assert_eq!(read_dir(dir.path().join("etc")).unwrap().count(), 2);
    }

    #[test]
    fn test_render_writes_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        create_dir_all(dir.path().join("etc/network")).unwrap();
        write(
            dir.path().join("etc/network/interfaces"),
            "#This is a test file\n",
        )
        .unwrap();
        let writer = DebianWriter::new(dir.path());
        let snap = snapshot(vec![("eth0", eth0()), ("eth1", eth1())]);

        writer.render("test-server", &snap).unwrap();
        writer.render("test-server", &snap).unwrap();

        assert_eq!(
            read_to_string(dir.path().join("etc/network/interfaces")).unwrap(),
            INTERFACES
        );
        assert_eq!(
            read_to_string(dir.path().join("etc/hostname")).unwrap(),
            "test-server\n"
        );
        let backups: Vec<String> = read_dir(dir.path().join("etc/network"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 2);
        let originals = backups
            .iter()
            .filter(|b| {
                read_to_string(dir.path().join("etc/network").join(b)).unwrap()
                    == "#This is a test file\n"
            })
            .count();
        assert_eq!(originals, 1);
    }
}
