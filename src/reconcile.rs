//! Drives one network reset: set the hostname, rewrite the OS network
//! configuration from the correlated snapshot, then restart network services.
//!
//! The outcome is a status string, `"0"` on success and otherwise the exit
//! code of the step that failed (`"1"` for enumeration and rendering errors).

use log::{debug, error, info};

use crate::constants;
use crate::correlate::correlate;
use crate::hwaddr::HwAddrResolver;
use crate::iflist::InterfaceLister;
use crate::model::{Interface, validate_hostname};
use crate::system::CommandRunner;
use crate::writer::OsWriter;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    SettingHostname,
    RewritingConfigs,
    RestartingServices,
    Done,
    Aborted(String),
}

pub struct Reconciler<'a> {
    lister: InterfaceLister,
    resolver: HwAddrResolver,
    writer: OsWriter,
    runner: &'a dyn CommandRunner,
    hostname_command: Vec<String>,
    restart_commands: Vec<Vec<String>>,
    state: State,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        lister: InterfaceLister,
        resolver: HwAddrResolver,
        writer: OsWriter,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        let restart_commands = writer.restart_commands();
        Self {
            lister,
            resolver,
            writer,
            runner,
            hostname_command: vec!["hostname".to_string()],
            restart_commands,
            state: State::Idle,
        }
    }

    /// Command the new hostname is appended to.
    pub fn with_hostname_command(mut self, command: Vec<String>) -> Self {
        self.hostname_command = command;
        self
    }

    pub fn with_restart_commands(mut self, commands: Vec<Vec<String>>) -> Self {
        self.restart_commands = commands;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    fn transition(&mut self, state: State) {
        debug!("Network reset: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn abort(&mut self, code: String) -> String {
        self.transition(State::Aborted(code.clone()));
        code
    }

    pub fn reset_network(&mut self, hostname: &str, records: &[Interface]) -> String {
        self.transition(State::SettingHostname);
        if let Err(e) = validate_hostname(hostname) {
            error!("Refusing to set hostname: {}", e);
            return self.abort(constants::STATUS_FAILED.to_string());
        }
        let mut argv = self.hostname_command.clone();
        argv.push(hostname.to_string());
        let code = self.runner.run(&argv);
        if code != 0 {
            error!("Unable to set hostname to {}, exit code {}", hostname, code);
            return self.abort(code.to_string());
        }

        self.transition(State::RewritingConfigs);
        let names = match self.lister.list() {
            Ok(names) => names,
            Err(e) => {
                error!("Unable to list network interfaces: {:#}", e);
                return self.abort(constants::STATUS_FAILED.to_string());
            }
        };
        let snapshot = correlate(&names, &self.resolver, records);
        if snapshot.is_empty() {
            info!("No local interface matches the control plane, nothing to do");
            self.transition(State::Done);
            return constants::STATUS_OK.to_string();
        }
        if let Err(e) = self.writer.render(hostname, &snapshot) {
            error!("Unable to write network configuration: {:#}", e);
            return self.abort(constants::STATUS_FAILED.to_string());
        }

        self.transition(State::RestartingServices);
        for argv in self.restart_commands.clone() {
            let code = self.runner.run(&argv);
            if code != 0 {
                error!("{:?} failed with exit code {}", argv, code);
                return self.abort(code.to_string());
            }
        }

        self.transition(State::Done);
        info!(
            "Network reset complete for {} interface(s)",
            snapshot.interfaces.len()
        );
        constants::STATUS_OK.to_string()
    }
}
