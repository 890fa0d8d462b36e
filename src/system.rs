use std::fs::read_to_string;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use anyhow::{Error, Result, anyhow};
use log::{debug, warn};
use nix::ifaddrs::getifaddrs;
use nix::sys::socket::SockaddrLike;
use rustix::system::uname;
use serde::Deserialize;

use crate::constants;
use crate::fs::{JoinRelative, path_exists};

/// Address family tag of link-layer entries reported by `getifaddrs(3)`.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const LINK_LAYER_FAMILY: i32 = libc::AF_PACKET;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const LINK_LAYER_FAMILY: i32 = libc::AF_LINK;

/// What a device-control hardware address query handed back. Kernels fill in
/// a `struct ifreq`; some helpers report the address as text instead.
#[derive(Clone, Debug, PartialEq)]
pub enum HwAddrReply {
    Raw(Vec<u8>),
    Text(String),
}

pub trait DeviceControl {
    fn hw_addr(&self, ifname: &str) -> Result<HwAddrReply>;
}

/// Issues `SIOCGIFHWADDR` against a throwaway datagram socket.
#[derive(Debug, Default)]
pub struct IoctlDeviceControl;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl DeviceControl for IoctlDeviceControl {
    fn hw_addr(&self, ifname: &str) -> Result<HwAddrReply> {
        use std::os::fd::AsRawFd;

        use socket2::{Domain, Socket, Type};

        // Large enough for struct ifreq on 32 and 64 bit targets.
        const IFREQ_SIZE: usize = 40;

        let name = ifname.as_bytes();
        if name.is_empty() || name.len() >= libc::IFNAMSIZ || name.contains(&0) {
            return Err(anyhow!("invalid interface name {:?}", ifname));
        }
        let sock = Socket::new(Domain::IPV4, Type::DGRAM, None)
            .map_err(|e| anyhow!("unable to create socket: {}", e))?;

        let mut req = [0u8; IFREQ_SIZE];
        req[..name.len()].copy_from_slice(name);
        // SAFETY: req is a zeroed buffer at least the size of struct ifreq with
        // a NUL terminated interface name at its start.
        let rc = unsafe {
            libc::ioctl(
                sock.as_raw_fd(),
                libc::SIOCGIFHWADDR as _,
                req.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(anyhow!(
                "SIOCGIFHWADDR failed for {}: {}",
                ifname,
                std::io::Error::last_os_error()
            ));
        }
        Ok(HwAddrReply::Raw(req.to_vec()))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
impl DeviceControl for IoctlDeviceControl {
    fn hw_addr(&self, ifname: &str) -> Result<HwAddrReply> {
        Err(anyhow!(
            "hardware address query for {} is not supported on this platform",
            ifname
        ))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkEntry {
    pub name: String,
    pub family: i32,
    pub address: Option<Vec<u8>>,
}

/// Interface enumeration library: one entry per interface address.
pub trait LinkLayerSource {
    fn entries(&self) -> Result<Vec<LinkEntry>>;
}

#[derive(Debug, Default)]
pub struct IfAddrs;

impl LinkLayerSource for IfAddrs {
    fn entries(&self) -> Result<Vec<LinkEntry>> {
        let addrs =
            getifaddrs().map_err(|e| anyhow!("unable to list interface addresses: {}", e))?;
        Ok(addrs
            .map(|ifa| {
                // SAFETY: as_ptr points at storage owned by ifa.address, which
                // always begins with a valid sockaddr header.
                let family = ifa
                    .address
                    .as_ref()
                    .map(|a| i32::from(unsafe { (*a.as_ptr()).sa_family }))
                    .unwrap_or(libc::AF_UNSPEC);
                let address = ifa
                    .address
                    .as_ref()
                    .and_then(|a| a.as_link_addr())
                    .and_then(|l| l.addr())
                    .map(|octets| octets.to_vec());
                LinkEntry {
                    name: ifa.interface_name,
                    family,
                    address,
                }
            })
            .collect())
    }
}

/// Runs external commands, returning their exit status. A command that cannot
/// be started reports 127 and one killed by a signal reports 128 plus the
/// signal number.
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> i32;
}

#[derive(Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String]) -> i32 {
        use std::os::unix::process::ExitStatusExt;

        let Some((program, args)) = argv.split_first() else {
            warn!("Refusing to run an empty command");
            return 127;
        };
        debug!("Running {:?}", argv);
        let output = match Command::new(program).args(args).output() {
            Ok(o) => o,
            Err(e) => {
                warn!("Unable to run {}: {}", program, e);
                return 127;
            }
        };
        let code = match (output.status.code(), output.status.signal()) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        };
        if code != 0 {
            warn!(
                "{:?} exited with {}: {}",
                argv,
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        code
    }
}

/// OS family whose network configuration dialect is written.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum Platform {
    Centos,
    Debian,
    FreeBsd,
    #[default]
    Default,
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "centos" | "rhel" | "redhat" | "fedora" => Ok(Self::Centos),
            "debian" | "ubuntu" => Ok(Self::Debian),
            "freebsd" => Ok(Self::FreeBsd),
            "default" => Ok(Self::Default),
            other => Err(anyhow!("unknown platform {:?}", other)),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl Platform {
    pub fn detect(root: &Path) -> Self {
        let uts = uname();
        if uts.sysname().to_bytes() == b"FreeBSD" {
            return Self::FreeBsd;
        }
        let os_release = root.join_relative(constants::FILE_ETC_OS_RELEASE);
        if let Ok(contents) = read_to_string(&os_release)
            && let Some(platform) = parse_os_release(&contents)
        {
            return platform;
        }
        let marker = |path: &str| path_exists(root.join_relative(path)).unwrap_or(false);
        if marker(constants::FILE_ETC_REDHAT_RELEASE) {
            Self::Centos
        } else if marker(constants::FILE_ETC_DEBIAN_VERSION) {
            Self::Debian
        } else {
            Self::Default
        }
    }
}

fn classify(id: &str) -> Option<Platform> {
    match id {
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" => Some(Platform::Centos),
        "debian" | "ubuntu" => Some(Platform::Debian),
        "freebsd" => Some(Platform::FreeBsd),
        _ => None,
    }
}

// ID is consulted before ID_LIKE, which may list several families.
fn parse_os_release(contents: &str) -> Option<Platform> {
    let mut id = None;
    let mut id_like = None;
    for line in contents.lines() {
        if let Some((key, value)) = line.trim().split_once('=') {
            let value = value.trim_matches(|c| c == '"' || c == '\'').to_ascii_lowercase();
            match key {
                "ID" => id = Some(value),
                "ID_LIKE" => id_like = Some(value),
                _ => {}
            }
        }
    }
    id.as_deref()
        .and_then(classify)
        .or_else(|| id_like?.split_whitespace().find_map(classify))
}

/// The kernel's idea of this host's name.
pub fn node_name() -> String {
    uname().nodename().to_string_lossy().into_owned()
}
