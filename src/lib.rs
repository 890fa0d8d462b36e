pub mod cli;
pub mod config;
pub mod constants;
pub mod controlplane;
pub mod correlate;
pub mod fs;
pub mod hwaddr;
pub mod iflist;
pub mod logger;
pub mod model;
pub mod netmask;
pub mod reconcile;
pub mod system;
pub mod writer;
