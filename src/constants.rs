pub const DIR_ROOT: &str = "/";
pub const DIR_SYS_CLASS_NET: &str = "/sys/class/net";
pub const DIR_SYSCONFIG_NETWORK_SCRIPTS: &str = "/etc/sysconfig/network-scripts";

pub const FILE_CONFIG: &str = "/etc/guestnet.yaml";
pub const FILE_ETC_DEBIAN_VERSION: &str = "/etc/debian_version";
pub const FILE_ETC_HOSTNAME: &str = "/etc/hostname";
pub const FILE_ETC_NETWORK_INTERFACES: &str = "/etc/network/interfaces";
pub const FILE_ETC_OS_RELEASE: &str = "/etc/os-release";
pub const FILE_ETC_RC_CONF_LOCAL: &str = "/etc/rc.conf.local";
pub const FILE_ETC_REDHAT_RELEASE: &str = "/etc/redhat-release";
pub const FILE_ETC_SYSCONFIG_NETWORK: &str = "/etc/sysconfig/network";

pub const PREFIX_IFCFG: &str = "ifcfg-";
pub const PREFIX_ROUTE: &str = "route-";

pub const CONTROL_PLANE_PREFIX: &str = "vm-data";
pub const CONTROL_PLANE_HOSTNAME: &str = "hostname";
pub const CONTROL_PLANE_NETWORKING: &str = "networking";

pub const HEADER_GENERATED: &str = "# Automatically generated, do not edit";

pub const STATUS_OK: &str = "0";
pub const STATUS_FAILED: &str = "1";
pub const STATUS_NOT_FOUND: &str = "127";
