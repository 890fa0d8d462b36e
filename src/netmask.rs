use std::fmt;
use std::net::Ipv4Addr;

use ipnet::{Ipv4Net, ipv4_mask_to_prefix};
use serde::{Deserialize, Deserializer, de};

/// Converts a dotted-decimal netmask to a prefix length. Masks that do not
/// parse or whose one bits are not contiguous yield `None`.
pub fn netmask_to_prefix(mask: &str) -> Option<u8> {
    let addr = mask.trim().parse::<Ipv4Addr>().ok()?;
    ipv4_mask_to_prefix(addr).ok()
}

pub fn prefix_to_netmask(prefix: u8) -> Option<Ipv4Addr> {
    Ipv4Net::new(Ipv4Addr::UNSPECIFIED, prefix)
        .ok()
        .map(|net| net.netmask())
}

/// A netmask as supplied by the control plane, either in dotted form or as a
/// prefix length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Netmask {
    Dotted(Ipv4Addr),
    Prefix(u8),
}

impl Netmask {
    pub fn prefix_len(&self) -> Option<u8> {
        match self {
            Self::Dotted(addr) => ipv4_mask_to_prefix(*addr).ok(),
            Self::Prefix(p) => Some(*p),
        }
    }

    /// Dotted form, for dialects that only speak IPv4 masks.
    pub fn dotted(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Dotted(addr) => Some(*addr),
            Self::Prefix(p) => prefix_to_netmask(*p),
        }
    }
}

impl fmt::Display for Netmask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Dotted(addr) => write!(f, "{}", addr),
            Self::Prefix(p) => write!(f, "{}", p),
        }
    }
}

impl TryFrom<&str> for Netmask {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        let value = value.trim();
        if let Ok(p) = value.parse::<u8>() {
            return Ok(Self::Prefix(p));
        }
        value
            .parse::<Ipv4Addr>()
            .map(Self::Dotted)
            .map_err(|_| anyhow::anyhow!("invalid netmask {:?}", value))
    }
}

impl<'de> Deserialize<'de> for Netmask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Prefix(u8),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Prefix(p) => Ok(Netmask::Prefix(p)),
            Raw::Text(s) => Netmask::try_from(s.as_str()).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_netmask_to_prefix() {
        struct Case<'a> {
            mask: &'a str,
            expected: Option<u8>,
        }
        let cases = [
            Case {
                mask: "255.255.255.0",
                expected: Some(24),
            },
            Case {
                mask: "255.255.0.0",
                expected: Some(16),
            },
            Case {
                mask: "255.255.224.0",
                expected: Some(19),
            },
            Case {
                mask: "255.240.0.0",
                expected: Some(12),
            },
            Case {
                mask: "255.255.255.255",
                expected: Some(32),
            },
            Case {
                mask: "0.0.0.0",
                expected: Some(0),
            },
            Case {
                mask: "255.0.255.0",
                expected: None,
            },
            Case {
                mask: "255.255.255",
                expected: None,
            },
            Case {
                mask: "not a mask",
                expected: None,
            },
        ];
        for case in cases {
            assert_eq!(case.expected, netmask_to_prefix(case.mask), "{}", case.mask);
        }
    }

    #[test]
    fn test_prefix_to_netmask() {
        assert_eq!(prefix_to_netmask(24), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(prefix_to_netmask(12), Some(Ipv4Addr::new(255, 240, 0, 0)));
        assert_eq!(prefix_to_netmask(0), Some(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(prefix_to_netmask(33), None);
    }

    #[test]
    fn test_netmask_deserialize() {
        let masks: Vec<Netmask> =
            serde_json::from_str(r#"["255.255.255.0", 64, "64"]"#).unwrap();
        assert_eq!(
            masks,
            vec![
                Netmask::Dotted(Ipv4Addr::new(255, 255, 255, 0)),
                Netmask::Prefix(64),
                Netmask::Prefix(64),
            ]
        );
        assert!(serde_json::from_str::<Netmask>(r#""garbage""#).is_err());
    }

    #[test]
    fn test_netmask_conversions() {
        let dotted = Netmask::Dotted(Ipv4Addr::new(255, 255, 224, 0));
        assert_eq!(dotted.prefix_len(), Some(19));
        assert_eq!(dotted.to_string(), "255.255.224.0");

        let prefix = Netmask::Prefix(24);
        assert_eq!(prefix.dotted(), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(prefix.to_string(), "24");
        assert_eq!(Netmask::Prefix(64).dotted(), None);
    }
}
