//! # sshsync-transport
//!
//! The seam between the sync engine and the secure channel provider.
//!
//! - [`session`]: [`Transport`] / [`Connection`] / [`Session`] capability traits
//! - [`keychain`]: ordered private-key store ([`KeyChain`])
//! - [`connect`]: [`Connector`]: ssh config + keys + transport → connection
//! - [`process`]: providers backed by the system `ssh` client or a local shell

pub mod connect;
pub mod error;
pub mod keychain;
pub mod process;
pub mod session;

pub use connect::Connector;
pub use error::{ConnectError, KeyError, TransportError};
pub use keychain::{KeyChain, LoadedKey};
pub use process::{Launcher, LocalTransport, OpenSshTransport, ProcessConnection, ProcessSession};
pub use session::{Connection, DialTarget, Session, SharedBuffer, TerminalModes, Transport};
