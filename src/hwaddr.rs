use std::sync::Arc;

use log::{debug, warn};

use crate::model::MacAddr;
use crate::system::{
    DeviceControl, HwAddrReply, IoctlDeviceControl, LINK_LAYER_FAMILY, LinkLayerSource,
};

// IFNAMSIZ bytes of name, then the two byte sa_family of ifr_hwaddr.
const IFREQ_HWADDR_OFFSET: usize = 18;
const HWADDR_LEN: usize = 6;

/// Normalizes a device-control reply to a hardware address.
pub fn parse_reply(reply: &HwAddrReply) -> Option<MacAddr> {
    match reply {
        HwAddrReply::Raw(block) => block
            .get(IFREQ_HWADDR_OFFSET..IFREQ_HWADDR_OFFSET + HWADDR_LEN)
            .and_then(MacAddr::from_octets),
        HwAddrReply::Text(text) => text.parse().ok(),
    }
}

/// Looks up the hardware address of a local interface, first through a
/// device-control query and then, when available, through the interface
/// enumeration library.
pub struct HwAddrResolver {
    device: Box<dyn DeviceControl>,
    fallback: Option<Arc<dyn LinkLayerSource>>,
    link_family: i32,
}

impl HwAddrResolver {
    pub fn new(
        device: Box<dyn DeviceControl>,
        fallback: Option<Arc<dyn LinkLayerSource>>,
        link_family: i32,
    ) -> Self {
        Self {
            device,
            fallback,
            link_family,
        }
    }

    pub fn system(fallback: Option<Arc<dyn LinkLayerSource>>) -> Self {
        Self::new(Box::new(IoctlDeviceControl), fallback, LINK_LAYER_FAMILY)
    }

    pub fn resolve(&self, ifname: &str) -> Option<MacAddr> {
        match self.device.hw_addr(ifname) {
            Ok(reply) => {
                if let Some(mac) = parse_reply(&reply) {
                    return Some(mac);
                }
                debug!("Unusable hardware address reply for {}: {:?}", ifname, reply);
            }
            Err(e) => debug!("Device query failed for {}: {}", ifname, e),
        }
        self.resolve_fallback(ifname)
    }

    fn resolve_fallback(&self, ifname: &str) -> Option<MacAddr> {
        let source = self.fallback.as_ref()?;
        let entries = match source.entries() {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Interface enumeration failed for {}: {}", ifname, e);
                return None;
            }
        };

        let mut mismatched = None;
        for entry in entries.iter().filter(|e| e.name == ifname) {
            let Some(octets) = &entry.address else {
                continue;
            };
            if entry.family != self.link_family {
                mismatched = Some(entry.family);
                continue;
            }
            if let Some(mac) = MacAddr::from_octets(octets) {
                return Some(mac);
            }
        }
        if let Some(family) = mismatched {
            warn!(
                "Ignoring hardware address of {} with address family {}, expected {}",
                ifname, family, self.link_family
            );
        }
        None
    }
}
