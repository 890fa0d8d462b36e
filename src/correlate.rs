use std::collections::HashMap;

use log::{debug, info, warn};

use crate::hwaddr::HwAddrResolver;
use crate::model::{HostNetworkSnapshot, Interface, MacAddr};

/// Matches control-plane interfaces to local interfaces by hardware address.
/// Local interfaces with no resolvable address, or whose address the control
/// plane does not claim, are left out.
pub fn correlate(
    local_names: &[String],
    resolver: &HwAddrResolver,
    records: &[Interface],
) -> HostNetworkSnapshot {
    let mut known: HashMap<&MacAddr, &Interface> = HashMap::new();
    for record in records {
        if known.insert(&record.mac, record).is_some() {
            warn!("Control plane lists {} more than once, using the last", record.mac);
        }
    }

    let mut names: Vec<&String> = local_names.iter().collect();
    names.sort();
    names.dedup();

    let mut snapshot = HostNetworkSnapshot::default();
    let mut claimed: HashMap<&MacAddr, &str> = HashMap::new();
    for name in names {
        snapshot.present.insert(name.clone());
        let Some(mac) = resolver.resolve(name) else {
            debug!("No hardware address for {}, skipping", name);
            continue;
        };
        let Some((mac_key, record)) = known.get_key_value(&mac) else {
            debug!("{} ({}) is not managed by the control plane", name, mac);
            continue;
        };
        if let Some(other) = claimed.get(mac_key) {
            warn!("{} shares hardware address {} with {}, skipping", name, mac, other);
            continue;
        }
        info!("Matched {} to {} ({})", name, mac, record.label);
        claimed.insert(*mac_key, name.as_str());
        snapshot.interfaces.insert(name.clone(), (*record).clone());
    }
    snapshot
}
