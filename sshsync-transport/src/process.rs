//! Process-backed sessions.
//!
//! Each [`ProcessSession`] spawns exactly one child process when it runs:
//! the system `ssh` client for [`OpenSshTransport`], or `sh -c` for
//! [`LocalTransport`], which treats the local machine as the remote host.

use std::io::{self, PipeReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::TransportError;
use crate::keychain::KeyChain;
use crate::session::{Connection, DialTarget, Session, TerminalModes, Transport};

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// How a remote command turns into a local child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// `<shell> -c <command>` on this machine. Pty requests are ignored.
    Local { shell: PathBuf },
    /// `<program> [-F <config>] -p <port> -l <user> [-i <key>...] -- <host> <command>`.
    OpenSsh {
        program: PathBuf,
        /// ssh config the client reads instead of `~/.ssh/config`.
        config: Option<PathBuf>,
        host: String,
        port: u16,
        user: String,
        identities: Vec<PathBuf>,
    },
}

impl Launcher {
    fn program(&self) -> &PathBuf {
        match self {
            Launcher::Local { shell } => shell,
            Launcher::OpenSsh { program, .. } => program,
        }
    }

    fn command(&self, remote: &str, pty: bool) -> Command {
        match self {
            Launcher::Local { shell } => {
                let mut cmd = Command::new(shell);
                cmd.arg("-c").arg(remote);
                cmd
            }
            Launcher::OpenSsh {
                program,
                config,
                host,
                port,
                user,
                identities,
            } => {
                let mut cmd = Command::new(program);
                if let Some(config) = config {
                    cmd.arg("-F").arg(config);
                }
                cmd.arg("-p").arg(port.to_string()).arg("-l").arg(user);
                for identity in identities {
                    cmd.arg("-i").arg(identity);
                }
                if !identities.is_empty() {
                    cmd.arg("-o").arg("IdentitiesOnly=yes");
                }
                cmd.arg("-o").arg("BatchMode=yes");
                cmd.arg(if pty { "-tt" } else { "-T" });
                cmd.arg("--").arg(host).arg(remote);
                cmd
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A [`Session`] backed by one child process.
pub struct ProcessSession {
    launcher: Launcher,
    pty: bool,
    stdin: Option<PipeReader>,
    stdin_taken: bool,
    stdout: Option<Box<dyn Write + Send>>,
    stderr: Option<Box<dyn Write + Send>>,
    started: bool,
}

impl ProcessSession {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            pty: false,
            stdin: None,
            stdin_taken: false,
            stdout: None,
            stderr: None,
            started: false,
        }
    }
}

impl Session for ProcessSession {
    fn request_pty(
        &mut self,
        _term: &str,
        _rows: u16,
        _cols: u16,
        _modes: &TerminalModes,
    ) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        self.pty = true;
        Ok(())
    }

    fn stdin_pipe(&mut self) -> Result<Box<dyn Write + Send>, TransportError> {
        if self.stdin_taken {
            return Err(TransportError::PipeTaken);
        }
        let (reader, writer) = io::pipe()?;
        self.stdin = Some(reader);
        self.stdin_taken = true;
        Ok(Box::new(writer))
    }

    fn set_stdout(&mut self, sink: Box<dyn Write + Send>) {
        self.stdout = Some(sink);
    }

    fn set_stderr(&mut self, sink: Box<dyn Write + Send>) {
        self.stderr = Some(sink);
    }

    fn run(&mut self, command: &str) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        self.started = true;

        let mut cmd = self.launcher.command(command, self.pty);
        cmd.stdin(self.stdin.take().map_or_else(Stdio::null, Stdio::from))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: self.launcher.program().display().to_string(),
            source,
        })?;
        // Release the parent's copy of the stdin read end.
        drop(cmd);

        let child_out = child.stdout.take();
        let child_err = child.stderr.take();
        let mut out_sink = self.stdout.take().unwrap_or_else(discard);
        let mut err_sink = self.stderr.take().unwrap_or_else(discard);

        let status = thread::scope(|scope| {
            let out = scope.spawn(move || pump(child_out, out_sink.as_mut()));
            let err = scope.spawn(move || pump(child_err, err_sink.as_mut()));
            let status = child.wait();
            let pumped_out = out
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdout pump panicked")));
            let pumped_err = err
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stderr pump panicked")));
            status.and_then(|s| pumped_out.and(pumped_err).map(|_| s))
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(TransportError::ExitStatus {
                command: command.to_owned(),
                code: status.code(),
            })
        }
    }
}

fn discard() -> Box<dyn Write + Send> {
    Box::new(io::sink())
}

fn pump(source: Option<impl Read>, sink: &mut dyn Write) -> io::Result<()> {
    if let Some(mut source) = source {
        io::copy(&mut source, &mut *sink)?;
    }
    sink.flush()
}

// ---------------------------------------------------------------------------
// Connections and transports
// ---------------------------------------------------------------------------

/// A connection whose sessions are [`ProcessSession`]s sharing one launcher.
#[derive(Debug, Clone)]
pub struct ProcessConnection {
    launcher: Launcher,
}

impl ProcessConnection {
    pub fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }
}

impl Connection for ProcessConnection {
    fn open_session(&self) -> Result<Box<dyn Session>, TransportError> {
        Ok(Box::new(ProcessSession::new(self.launcher.clone())))
    }
}

/// Delegates the secure channel to the system OpenSSH client.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    program: PathBuf,
    config: Option<PathBuf>,
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            config: None,
        }
    }
}

impl OpenSshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `ssh` binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config: None,
        }
    }

    /// Make the client read `path` instead of `~/.ssh/config`, matching the
    /// source the endpoint was resolved from.
    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }
}

impl Transport for OpenSshTransport {
    type Connection = ProcessConnection;

    /// Builds the launcher from the resolved endpoint and the keychain's
    /// source files, then proves reachability and authentication by running
    /// `true` on the remote side.
    fn dial(
        &self,
        target: &DialTarget,
        keys: &KeyChain,
    ) -> Result<ProcessConnection, TransportError> {
        let launcher = Launcher::OpenSsh {
            program: self.program.clone(),
            config: self.config.clone(),
            host: target.host.clone(),
            port: target.port,
            user: target.user.clone(),
            identities: keys.paths().map(|p| p.to_path_buf()).collect(),
        };
        let connection = ProcessConnection::new(launcher);
        let mut probe = connection.open_session()?;
        let (output, result) = probe.combined_output("true");
        result.map_err(|e| match e {
            TransportError::ExitStatus { .. } => {
                let detail = String::from_utf8_lossy(&output).trim().to_string();
                TransportError::Other(if detail.is_empty() { e.to_string() } else { detail })
            }
            other => other,
        })?;
        Ok(connection)
    }
}

/// Runs "remote" commands on the local machine through `sh -c`.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: PathBuf,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection without going through [`Transport::dial`].
    pub fn connection(&self) -> ProcessConnection {
        ProcessConnection::new(Launcher::Local {
            shell: self.shell.clone(),
        })
    }
}

impl Transport for LocalTransport {
    type Connection = ProcessConnection;

    fn dial(
        &self,
        _target: &DialTarget,
        _keys: &KeyChain,
    ) -> Result<ProcessConnection, TransportError> {
        Ok(self.connection())
    }
}
