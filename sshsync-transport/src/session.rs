//! Capability interface of the secure channel provider.
//!
//! The sync engine never talks to a network stack directly. It dials through
//! a [`Transport`], opens one [`Session`] per remote operation from the
//! resulting [`Connection`], and drops the session when the operation ends.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::keychain::KeyChain;

/// Terminal mode opcodes and values sent with a pty request.
pub type TerminalModes = BTreeMap<u8, u32>;

/// Endpoint and identity handed to [`Transport::dial`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    /// Always `"tcp"` for ssh endpoints.
    pub network: String,
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl DialTarget {
    pub fn tcp(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            network: "tcp".to_string(),
            host: host.into(),
            port,
            user: user.into(),
        }
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens authenticated connections.
pub trait Transport {
    type Connection: Connection;

    /// Connect to `target` and authenticate as `target.user` with `keys`.
    fn dial(&self, target: &DialTarget, keys: &KeyChain)
        -> Result<Self::Connection, TransportError>;
}

/// An authenticated connection able to host independent sessions.
///
/// A connection is single-owner: concurrent sync runs over one connection
/// need external synchronization.
pub trait Connection: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn Session>, TransportError>;
}

/// One remote command execution. A session runs at most one command and is
/// closed when dropped.
pub trait Session: Send {
    /// Ask for a pseudo-terminal before the command starts.
    fn request_pty(
        &mut self,
        term: &str,
        rows: u16,
        cols: u16,
        modes: &TerminalModes,
    ) -> Result<(), TransportError>;

    /// Writer connected to the remote command's standard input. Closing
    /// (dropping) it signals end of input.
    fn stdin_pipe(&mut self) -> Result<Box<dyn Write + Send>, TransportError>;

    /// Where the remote standard output goes. Discarded when never set.
    fn set_stdout(&mut self, sink: Box<dyn Write + Send>);

    /// Where the remote standard error goes. Discarded when never set.
    fn set_stderr(&mut self, sink: Box<dyn Write + Send>);

    /// Run `command` to completion. A non-zero exit is an error.
    fn run(&mut self, command: &str) -> Result<(), TransportError>;

    /// Run `command` with stdout and stderr interleaved into one buffer.
    ///
    /// The captured bytes are returned even when the command fails.
    fn combined_output(&mut self, command: &str) -> (Vec<u8>, Result<(), TransportError>) {
        let buffer = SharedBuffer::default();
        self.set_stdout(Box::new(buffer.clone()));
        self.set_stderr(Box::new(buffer.clone()));
        let result = self.run(command);
        (buffer.take(), result)
    }
}

/// Cloneable in-memory sink; every clone appends to the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Drain the collected bytes.
    pub fn take(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(mut bytes) => std::mem::take(&mut *bytes),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("output buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
