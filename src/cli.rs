use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{debug, info};

use crate::config::Config;
use crate::constants;
use crate::controlplane::{ControlPlaneData, XenstoreCli};
use crate::hwaddr::HwAddrResolver;
use crate::iflist::InterfaceLister;
use crate::logger::{init_logger, level_for};
use crate::model::Interface;
use crate::reconcile::Reconciler;
use crate::system::{IfAddrs, LinkLayerSource, SystemCommandRunner};
use crate::writer::OsWriter;

/// Keeps guest network configuration in sync with the hypervisor.
#[derive(Debug, Parser)]
#[command(name = "guestnet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = constants::FILE_CONFIG)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite network configuration and restart networking
    ResetNetwork {
        /// Hostname to set instead of the one from the control plane
        #[arg(long)]
        hostname: Option<String>,

        /// JSON array of interface records to use instead of the control
        /// plane, `-` for standard input
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

/// Parses arguments, runs the requested command and returns its status.
pub fn run() -> Result<String> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    init_logger(level_for(cli.debug || config.debug()))
        .map_err(|e| anyhow!("unable to initialize logger: {}", e))?;

    match cli.command {
        Commands::ResetNetwork { hostname, payload } => {
            reset_network(&config, hostname, payload)
        }
    }
}

fn reset_network(
    config: &Config,
    hostname: Option<String>,
    payload: Option<PathBuf>,
) -> Result<String> {
    let xenstore = XenstoreCli;
    let data = ControlPlaneData::new(&xenstore, &config.control_plane_prefix());
    let records = match payload {
        Some(path) => read_payload(&path)?,
        None => data.interface_records(),
    };
    let hostname = hostname.unwrap_or_else(|| data.get_hostname());

    let root = config.root_dir();
    let platform = config.platform();
    info!("Resetting network for {:?} under {}", platform, root.to_string_lossy());

    let links: Arc<dyn LinkLayerSource> = Arc::new(IfAddrs);
    let runner = SystemCommandRunner;
    let writer = OsWriter::for_platform(platform, &root);
    let mut reconciler = Reconciler::new(
        InterfaceLister::system(&root, Some(links.clone())),
        HwAddrResolver::system(Some(links)),
        writer,
        &runner,
    )
    .with_hostname_command(config.hostname_command());
    if let Some(commands) = &config.restart_commands {
        reconciler = reconciler.with_restart_commands(commands.clone());
    }
    Ok(reconciler.reset_network(&hostname, &records))
}

fn read_payload(path: &Path) -> Result<Vec<Interface>> {
    let reader: Box<dyn Read> = if path.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(path)
            .map_err(|e| anyhow!("unable to open {}: {}", path.to_string_lossy(), e))?;
        Box::new(file)
    };
    let records = parse_payload(BufReader::new(reader))?;
    debug!("Read {} interface record(s) from payload", records.len());
    Ok(records)
}

fn parse_payload<R: Read>(reader: R) -> Result<Vec<Interface>> {
    serde_json::from_reader(reader).map_err(|e| anyhow!("unable to parse payload: {}", e))
}

/// Exit code for a status string. Anything that is not a valid exit code
/// maps to 1.
pub fn exit_code(status: &str) -> i32 {
    match status.trim().parse::<i32>() {
        Ok(code) if (0..=255).contains(&code) => code,
        _ => 1,
    }
}
