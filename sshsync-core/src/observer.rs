//! Injectable diagnostics.
//!
//! Components never log on their own; they report [`Event`]s to the
//! [`Observer`] they were built with. [`LogObserver`] forwards to the `log`
//! facade, [`NullObserver`] drops everything.

use std::error::Error;
use std::path::Path;

/// Something noteworthy that happened inside a component.
#[derive(Debug)]
pub enum Event<'a> {
    /// The ssh config source could not be read or parsed; resolution goes on
    /// with an empty option set.
    ConfigUnavailable { path: &'a Path, error: &'a dyn Error },
    /// A `Port` option was not a valid port number.
    InvalidPort { value: &'a str },
    /// An `IdentityFile` could not be loaded and was left out.
    KeySkipped { path: &'a Path, error: &'a dyn Error },
    /// About to dial the resolved endpoint.
    Dialing {
        address: &'a str,
        user: &'a str,
        keys: usize,
    },
    /// A remote command is about to run.
    Command { command: &'a str },
    /// A file transfer session was opened.
    TransferStarted { local: &'a Path, remote: &'a str },
    /// The archive pipe is open; the remote unpack may start.
    TransferReady { remote: &'a str },
    /// A remote-only file is about to be removed.
    Delete { path: &'a str },
    /// A local file is about to be uploaded.
    Upload {
        path: &'a str,
        local_digest: &'a str,
        remote_digest: Option<&'a str>,
    },
}

/// Receiver for [`Event`]s. Implementations must tolerate calls from the
/// transfer producer thread.
pub trait Observer: Send + Sync {
    fn event(&self, event: &Event<'_>);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn event(&self, event: &Event<'_>) {
        match event {
            Event::ConfigUnavailable { path, error } => {
                tracing::debug!("ssh config {} unavailable: {error}", path.display())
            }
            Event::InvalidPort { value } => {
                tracing::warn!("ignoring invalid Port '{value}', using default")
            }
            Event::KeySkipped { path, error } => {
                tracing::warn!("skipping identity {}: {error}", path.display())
            }
            Event::Dialing {
                address,
                user,
                keys,
            } => tracing::info!("[ssh] dialing {user}@{address} with {keys} key(s)"),
            Event::Command { command } => tracing::debug!("[ssh] [run] {command}"),
            Event::TransferStarted { local, remote } => {
                tracing::info!("[ssh] [send-file] {} to {remote}", local.display())
            }
            Event::TransferReady { remote } => tracing::trace!("[ssh] pipe ready for {remote}"),
            Event::Delete { path } => tracing::info!("[ssh] delete {path}"),
            Event::Upload {
                path,
                local_digest,
                remote_digest,
            } => tracing::info!(
                "[ssh] upload {path} ({} -> {local_digest})",
                remote_digest.unwrap_or("new")
            ),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn event(&self, _event: &Event<'_>) {}
}
