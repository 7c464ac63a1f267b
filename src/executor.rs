//! Runs external programs on behalf of the backends.
//!
//! Every invocation is logged before it happens. Nothing is retried; the
//! caller decides whether a failure is fatal.

use log::info;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Invokes one program, tagging its log lines with the build they belong to.
#[derive(Clone, Debug)]
pub struct Executor {
    program: String,
    log_prefix: String,
}

impl Executor {
    pub fn new<P: Into<String>>(program: P) -> Executor {
        Executor {
            program: program.into(),
            log_prefix: String::new(),
        }
    }

    pub fn set_log_prefix<S: Into<String>>(&mut self, prefix: S) {
        self.log_prefix = prefix.into();
    }

    /// Runs the program, streaming its stdout and stderr to ours.
    pub fn run(&self, args: &[&str]) -> Result<()> {
        let command = self.announce(args);

        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(Error::CommandFailed { command, status });
        }

        Ok(())
    }

    /// Runs the program and returns what it wrote to stdout. Stderr still goes to ours.
    pub fn output(&self, args: &[&str]) -> Result<Vec<u8>> {
        let command = self.announce(args);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command,
                status: output.status,
            });
        }

        Ok(output.stdout)
    }

    pub fn command_line(&self, args: &[&str]) -> String {
        let mut line = self.program.clone();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn announce(&self, args: &[&str]) -> String {
        let command = self.command_line(args);
        info!("{}running command: {}", self.log_prefix, command);
        command
    }
}
