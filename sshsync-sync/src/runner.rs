//! One-shot remote command execution.

use std::sync::Arc;

use sshsync_core::{Event, Observer};
use sshsync_transport::{Connection, TerminalModes};

use crate::error::SyncError;

/// Runs single commands over a connection, one session per command.
#[derive(Clone)]
pub struct CommandRunner {
    observer: Arc<dyn Observer>,
}

impl CommandRunner {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }

    /// Run `command` and return its interleaved stdout and stderr.
    ///
    /// Commands starting with `sudo` get an `xterm` pty (40x80) so a
    /// password prompt has a terminal to talk to. The session is closed
    /// before returning, on success and on failure alike.
    pub fn run(&self, conn: &dyn Connection, command: &str) -> Result<String, SyncError> {
        self.observer.event(&Event::Command { command });

        let mut session = conn.open_session()?;
        if command.starts_with("sudo") {
            session.request_pty("xterm", 40, 80, &TerminalModes::new())?;
        }

        let (output, result) = session.combined_output(command);
        let output = String::from_utf8_lossy(&output).into_owned();
        match result {
            Ok(()) => Ok(output),
            Err(source) => Err(SyncError::Command {
                command: command.to_owned(),
                output,
                source,
            }),
        }
    }
}
