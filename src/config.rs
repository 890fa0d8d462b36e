use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::debug;
use serde::Deserialize;

use crate::constants;
use crate::fs::path_exists;
use crate::system::Platform;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub debug: Option<bool>,
    pub platform: Option<Platform>,
    pub root_dir: Option<PathBuf>,
    pub hostname_command: Option<Vec<String>>,
    pub restart_commands: Option<Vec<Vec<String>>>,
    pub control_plane_prefix: Option<String>,
}

impl Config {
    pub fn from_string(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml2::from_str::<Config>(value)
            .map_err(|e| anyhow!("unable to parse configuration: {}", e))
    }

    /// Loads `path`, treating a missing file as an empty configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path_exists(path)? {
            debug!("{} not found, using defaults", path.to_string_lossy());
            return Ok(Self::default());
        }
        let contents = read_to_string(path)
            .map_err(|e| anyhow!("unable to read {}: {}", path.to_string_lossy(), e))?;
        Self::from_string(&contents)
    }

    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    pub fn root_dir(&self) -> PathBuf {
        self.root_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::DIR_ROOT))
    }

    /// The configured platform, or the one detected under the root directory.
    pub fn platform(&self) -> Platform {
        self.platform
            .unwrap_or_else(|| Platform::detect(&self.root_dir()))
    }

    pub fn hostname_command(&self) -> Vec<String> {
        self.hostname_command
            .clone()
            .unwrap_or_else(|| vec!["hostname".to_string()])
    }

    pub fn control_plane_prefix(&self) -> String {
        self.control_plane_prefix
            .clone()
            .unwrap_or_else(|| constants::CONTROL_PLANE_PREFIX.to_string())
    }
}

#[cfg(test)]
mod test {
    use std::fs::write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_from_string() {
        struct Case<'a> {
            value: &'a str,
            expected: Config,
        }
        let cases = [
            Case {
                value: "",
                expected: Config::default(),
            },
            Case {
                value: "debug: true\nplatform: freebsd\n",
                expected: Config {
                    debug: Some(true),
                    platform: Some(Platform::FreeBsd),
                    ..Default::default()
                },
            },
            Case {
                value: "platform: \"RHEL\"\n",
                expected: Config {
                    platform: Some(Platform::Centos),
                    ..Default::default()
                },
            },
            Case {
                value: "platform: ubuntu\nroot-dir: /mnt\ncontrol-plane-prefix: data\n",
                expected: Config {
                    platform: Some(Platform::Debian),
                    root_dir: Some(PathBuf::from("/mnt")),
                    control_plane_prefix: Some("data".to_string()),
                    ..Default::default()
                },
            },
            Case {
                value: "hostname-command: [hostnamectl, set-hostname]\nrestart-commands:\n  - [systemctl, restart, networking]\n",
                expected: Config {
                    hostname_command: Some(vec![
                        "hostnamectl".to_string(),
                        "set-hostname".to_string(),
                    ]),
                    restart_commands: Some(vec![vec![
                        "systemctl".to_string(),
                        "restart".to_string(),
                        "networking".to_string(),
                    ]]),
                    ..Default::default()
                },
            },
        ];
        for case in cases {
            assert_eq!(Config::from_string(case.value).unwrap(), case.expected);
        }
    }

    #[test]
    fn test_from_string_invalid() {
        assert!(Config::from_string("platform: solaris\n").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.debug());
        assert_eq!(config.root_dir(), PathBuf::from("/"));
        assert_eq!(config.hostname_command(), vec!["hostname"]);
        assert_eq!(config.control_plane_prefix(), "vm-data");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guestnet.yaml");
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());

        write(&path, "platform: centos\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.platform(), Platform::Centos);
    }
}
