use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use anyhow::{Error, Result, anyhow};
use serde::{Deserialize, Deserializer, de};

use crate::netmask::Netmask;

/// Hardware address in normalized form: twelve uppercase hex digits, no
/// separators.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr(String);

impl MacAddr {
    pub fn from_octets(octets: &[u8]) -> Option<Self> {
        if octets.len() != 6 {
            return None;
        }
        Some(Self(octets.iter().map(|o| format!("{:02X}", o)).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid hardware address {:?}", s));
        }
        Ok(Self(digits.to_ascii_uppercase()))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One address alias. The position in its list is the alias index.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(bound(deserialize = "A: FromStr, <A as FromStr>::Err: std::fmt::Display"))]
pub struct IpBinding<A> {
    #[serde(deserialize_with = "addr")]
    pub ip: A,
    pub netmask: Netmask,
    #[serde(default = "enabled_default", deserialize_with = "flag")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "optional_addr")]
    pub gateway: Option<A>,
}

pub type Ipv4Binding = IpBinding<Ipv4Addr>;
pub type Ipv6Binding = IpBinding<Ipv6Addr>;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StaticRoute {
    pub route: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

/// A network adapter as described by the control plane.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Interface {
    #[serde(default, deserialize_with = "plain_text")]
    pub label: String,
    pub mac: MacAddr,
    #[serde(default)]
    pub ips: Vec<Ipv4Binding>,
    #[serde(default)]
    pub ip6s: Vec<Ipv6Binding>,
    #[serde(default, deserialize_with = "optional_addr")]
    pub gateway: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "optional_addr")]
    pub gateway_v6: Option<Ipv6Addr>,
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
    #[serde(default)]
    pub dns: Vec<IpAddr>,
}

impl Interface {
    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| anyhow!("unable to parse interface: {}", e))
    }

    /// The interface gateway, or the first alias gateway when the interface
    /// does not name one.
    pub fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
            .or_else(|| self.ips.iter().find_map(|b| b.gateway))
    }

    pub fn default_gateway_v6(&self) -> Option<Ipv6Addr> {
        self.gateway_v6
            .or_else(|| self.ip6s.iter().find_map(|b| b.gateway))
    }
}

/// Control-plane interfaces keyed by the local interface they were matched
/// to, along with every interface name found on the host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostNetworkSnapshot {
    pub interfaces: BTreeMap<String, Interface>,
    pub present: BTreeSet<String>,
}

impl HostNetworkSnapshot {
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// Checks that `name` is a valid hostname: dot-separated labels of letters,
/// digits and inner hyphens, at most 253 characters overall.
pub fn validate_hostname(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(anyhow!("invalid hostname {:?}", name))
    }
}

fn enabled_default() -> bool {
    true
}

fn addr<'de, D, A>(deserializer: D) -> Result<A, D::Error>
where
    D: Deserializer<'de>,
    A: FromStr,
    A::Err: fmt::Display,
{
    let s = String::deserialize(deserializer)?;
    s.trim().parse().map_err(de::Error::custom)
}

// Absent, null and empty strings are all treated as no address.
fn optional_addr<'de, D, A>(deserializer: D) -> Result<Option<A>, D::Error>
where
    D: Deserializer<'de>,
    A: FromStr,
    A::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s.trim().parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

// Free text that ends up in shell-sourced files: no quotes, backslashes or
// control characters.
fn plain_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s
        .chars()
        .any(|c| c.is_control() || matches!(c, '"' | '\'' | '\\' | '`' | '$'))
    {
        return Err(de::Error::custom(format!("invalid characters in {:?}", s)));
    }
    Ok(s)
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag {:?}", other))),
        },
    }
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    pub(crate) const ETH0_JSON: &str = r#"{
        "ip6s": [
            {"ip": "2001:4802:7802:104:be76:4eff:fe20:7572", "netmask": 64, "enabled": "1", "gateway": "fe80::def"},
            {"ip": "2001:4802:7802:104:be76:4eff:fe20:7573", "netmask": 64, "enabled": "1", "gateway": "fe80::def"}
        ],
        "label": "public",
        "broadcast": "104.130.4.255",
        "ips": [
            {"ip": "104.130.4.72", "netmask": "255.255.255.0", "enabled": "1", "gateway": "104.130.4.1"},
            {"ip": "104.130.4.73", "netmask": "255.255.255.0", "enabled": "1", "gateway": "104.130.4.1"}
        ],
        "mac": "BC:76:4E:20:75:72",
        "gateway_v6": "fe80::def",
        "dns": ["69.20.0.164", "69.20.0.196"],
        "gateway": "104.130.4.1"
    }"#;

    pub(crate) const ETH1_JSON: &str = r#"{
        "label": "private",
        "ips": [
            {"ip": "10.208.227.239", "netmask": "255.255.224.0", "enabled": "1", "gateway": null}
        ],
        "mac": "BC:76:4E:20:6C:5B",
        "routes": [
            {"route": "10.208.0.0", "netmask": "255.240.0.0", "gateway": "10.208.224.1"},
            {"route": "10.176.0.0", "netmask": "255.240.0.0", "gateway": "10.208.224.1"}
        ],
        "gateway": ""
    }"#;

    pub(crate) fn eth0() -> Interface {
        Interface::from_json(ETH0_JSON).unwrap()
    }

    pub(crate) fn eth1() -> Interface {
        Interface::from_json(ETH1_JSON).unwrap()
    }

    pub(crate) fn snapshot(interfaces: Vec<(&str, Interface)>) -> HostNetworkSnapshot {
        let mut snapshot = HostNetworkSnapshot::default();
        for (name, iface) in interfaces {
            snapshot.present.insert(name.to_string());
            snapshot.interfaces.insert(name.to_string(), iface);
        }
        snapshot
    }

    #[test]
    fn test_mac_addr_normalization() {
        let colon: MacAddr = "BC:76:4E:20:75:72".parse().unwrap();
        let bare: MacAddr = "BC764E207572".parse().unwrap();
        let lower: MacAddr = "bc-76-4e-20-75-72".parse().unwrap();
        assert_eq!(colon, bare);
        assert_eq!(lower, bare);
        assert_eq!(bare.as_str(), "BC764E207572");
        assert_eq!(
            MacAddr::from_octets(&[0xbc, 0x76, 0x4e, 0x20, 0x75, 0x72]),
            Some(bare)
        );
    }

    #[test]
    fn test_mac_addr_invalid() {
        for s in ["", "BC:76:4E:20:75", "BC:76:4E:20:75:7G", "BC764E2075721"] {
            assert!(s.parse::<MacAddr>().is_err(), "{}", s);
        }
        assert_eq!(MacAddr::from_octets(&[0; 8]), None);
    }

    #[test]
    fn test_interface_from_json() {
        let iface = eth0();
        assert_eq!(iface.label, "public");
        assert_eq!(iface.mac.as_str(), "BC764E207572");
        assert_eq!(iface.ips.len(), 2);
        assert_eq!(iface.ips[1].ip, Ipv4Addr::new(104, 130, 4, 73));
        assert!(iface.ips[0].enabled);
        assert_eq!(iface.ip6s[0].netmask, Netmask::Prefix(64));
        assert_eq!(iface.gateway, Some(Ipv4Addr::new(104, 130, 4, 1)));
        assert_eq!(iface.gateway_v6, Some("fe80::def".parse().unwrap()));
        assert_eq!(iface.dns.len(), 2);
        assert!(iface.routes.is_empty());
    }

    #[test]
    fn test_interface_optional_fields() {
        let iface = eth1();
        assert_eq!(iface.gateway, None);
        assert_eq!(iface.ips[0].gateway, None);
        assert!(iface.ip6s.is_empty());
        assert_eq!(iface.routes.len(), 2);
        assert_eq!(iface.default_gateway(), None);
        assert_eq!(iface.default_gateway_v6(), None);
    }

    #[test]
    fn test_interface_gateway_from_alias() {
        let iface = Interface::from_json(
            r#"{"mac": "bc764e207572", "ips": [{"ip": "10.0.0.5", "netmask": "255.255.255.0", "gateway": "10.0.0.1"}]}"#,
        )
        .unwrap();
        assert_eq!(iface.default_gateway(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(iface.ips[0].enabled);
    }

    #[test]
    fn test_interface_rejects_unsafe_label() {
        for label in [r#"public\nGATEWAY=1.2.3.4"#, r#"pub\"lic"#, "$(reboot)"] {
            let json = format!(r#"{{"mac": "BC764E207572", "label": "{}"}}"#, label);
            assert!(Interface::from_json(&json).is_err(), "{}", label);
        }
    }

    #[test]
    fn test_validate_hostname() {
        struct Case<'a> {
            name: &'a str,
            ok: bool,
        }
        let cases = [
            Case {
                name: "test-server",
                ok: true,
            },
            Case {
                name: "web01.example.com",
                ok: true,
            },
            Case {
                name: "",
                ok: false,
            },
            Case {
                name: "bad\nhostname",
                ok: false,
            },
            Case {
                name: "quote\"d",
                ok: false,
            },
            Case {
                name: "-leading",
                ok: false,
            },
            Case {
                name: "double..dot",
                ok: false,
            },
        ];
        for case in cases {
            assert_eq!(validate_hostname(case.name).is_ok(), case.ok, "{:?}", case.name);
        }
    }

    #[test]
    fn test_interface_rejects_bad_address() {
        let result = Interface::from_json(
            r#"{"mac": "BC764E207572", "ips": [{"ip": "10.0.0", "netmask": "255.255.255.0"}]}"#,
        );
        assert!(result.is_err());
    }
}
