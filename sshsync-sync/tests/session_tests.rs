//! CommandRunner and FileTransferer against an in-memory session double that
//! records the order of everything it sees.

use std::fs;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

use filetime::{set_file_mtime, FileTime};
use sshsync_core::{Event, Observer};
use sshsync_sync::{CommandRunner, FileTransferer, SinkFactory, SyncEngine, SyncError};
use sshsync_transport::{Connection, Session, SharedBuffer, TerminalModes, TransportError};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Double
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn position(&self, line: &str) -> Option<usize> {
        self.entries().iter().position(|l| l == line)
    }

    fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }
}

/// How the fake remote side behaves.
#[derive(Clone, Default)]
struct Script {
    refuse_pipe: bool,
    /// Exit code of failing commands.
    exit_code: Option<i32>,
    /// Only commands starting with this fail; every command when `None`.
    fail_on: Option<&'static str>,
    output: &'static str,
    /// Output of the remote digest listing command.
    listing: String,
    /// Pipe writes past this many fail with `BrokenPipe`.
    writes_before_break: Option<usize>,
}

/// Set once the stdin pipe handed to a session is closed.
#[derive(Default)]
struct Closed {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Closed {
    fn set(&self) {
        if let Ok(mut done) = self.done.lock() {
            *done = true;
        }
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }
}

struct FakeConnection {
    log: Log,
    stdin: SharedBuffer,
    script: Script,
}

impl FakeConnection {
    fn new(script: Script) -> Self {
        Self {
            log: Log::default(),
            stdin: SharedBuffer::default(),
            script,
        }
    }
}

impl Connection for FakeConnection {
    fn open_session(&self) -> Result<Box<dyn Session>, TransportError> {
        self.log.push("open");
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            stdin: self.stdin.clone(),
            script: self.script.clone(),
            stdout: None,
            stdin_closed: None,
        }))
    }
}

struct FakeSession {
    log: Log,
    stdin: SharedBuffer,
    script: Script,
    stdout: Option<Box<dyn Write + Send>>,
    stdin_closed: Option<Arc<Closed>>,
}

impl Session for FakeSession {
    fn request_pty(
        &mut self,
        term: &str,
        rows: u16,
        cols: u16,
        modes: &TerminalModes,
    ) -> Result<(), TransportError> {
        self.log.push(format!("pty {term} {rows}x{cols} modes={}", modes.len()));
        Ok(())
    }

    fn stdin_pipe(&mut self) -> Result<Box<dyn Write + Send>, TransportError> {
        if self.script.refuse_pipe {
            return Err(TransportError::Other("pipe refused".into()));
        }
        self.log.push("pipe");
        let closed = Arc::new(Closed::default());
        self.stdin_closed = Some(closed.clone());
        Ok(Box::new(RecordingPipe {
            log: self.log.clone(),
            bytes: self.stdin.clone(),
            writes_left: self.script.writes_before_break,
            closed,
        }))
    }

    fn set_stdout(&mut self, sink: Box<dyn Write + Send>) {
        self.stdout = Some(sink);
    }

    fn set_stderr(&mut self, _sink: Box<dyn Write + Send>) {}

    /// Like a remote `tar -x`, a command fed through the stdin pipe only
    /// finishes once that pipe is closed.
    fn run(&mut self, command: &str) -> Result<(), TransportError> {
        self.log.push(format!("run {command}"));
        if let Some(closed) = &self.stdin_closed {
            closed.wait();
        }
        let output = if command.starts_with("if [ -d") {
            self.script.listing.as_str()
        } else {
            self.script.output
        };
        if let Some(out) = self.stdout.as_mut() {
            out.write_all(output.as_bytes())?;
        }
        let fails = self.script.fail_on.is_none_or(|prefix| command.starts_with(prefix));
        match self.script.exit_code {
            Some(code) if fails => Err(TransportError::ExitStatus {
                command: command.to_owned(),
                code: Some(code),
            }),
            _ => Ok(()),
        }
    }
}

struct RecordingPipe {
    log: Log,
    bytes: SharedBuffer,
    writes_left: Option<usize>,
    closed: Arc<Closed>,
}

impl Write for RecordingPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writes_left.as_mut() {
            Some(0) => return Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            Some(left) => *left -= 1,
            None => {}
        }
        self.log.push("write");
        self.bytes.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordingPipe {
    fn drop(&mut self) {
        self.log.push("close");
        self.closed.set();
    }
}

/// Shares the double's log so observer events interleave with session calls.
struct LogEvents(Log);

impl Observer for LogEvents {
    fn event(&self, event: &Event<'_>) {
        match event {
            Event::TransferReady { .. } => self.0.push("ready"),
            Event::Command { command } => self.0.push(format!("command {command}")),
            _ => {}
        }
    }
}

fn transferer(conn: &FakeConnection, stdout: &SharedBuffer) -> FileTransferer {
    let out = stdout.clone();
    let sink: SinkFactory = Arc::new(move || -> Box<dyn Write + Send> { Box::new(out.clone()) });
    let discard: SinkFactory = Arc::new(|| -> Box<dyn Write + Send> { Box::new(io::sink()) });
    FileTransferer::new(Arc::new(LogEvents(conn.log.clone()))).with_output(sink, discard)
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

#[test]
fn runner_returns_output_from_one_session() {
    let conn = FakeConnection::new(Script {
        output: "hello\n",
        ..Script::default()
    });
    let runner = CommandRunner::new(Arc::new(LogEvents(conn.log.clone())));

    let output = runner.run(&conn, "echo hello").unwrap();

    assert_eq!(output, "hello\n");
    assert_eq!(
        conn.log.entries(),
        vec!["command echo hello", "open", "run echo hello"]
    );
}

#[test]
fn sudo_commands_get_a_pty_first() {
    let conn = FakeConnection::new(Script::default());
    let runner = CommandRunner::new(Arc::new(LogEvents(conn.log.clone())));

    runner.run(&conn, "sudo systemctl restart app").unwrap();

    let pty = conn.log.position("pty xterm 40x80 modes=0").expect("pty");
    let run = conn
        .log
        .position("run sudo systemctl restart app")
        .expect("run");
    assert!(pty < run);
}

#[test]
fn plain_commands_get_no_pty() {
    let conn = FakeConnection::new(Script::default());
    let runner = CommandRunner::new(Arc::new(LogEvents(conn.log.clone())));

    runner.run(&conn, "ls").unwrap();

    assert!(!conn.log.entries().iter().any(|l| l.starts_with("pty")));
}

#[test]
fn failed_command_carries_its_output() {
    let conn = FakeConnection::new(Script {
        exit_code: Some(1),
        output: "rm: cannot remove 'x'\n",
        ..Script::default()
    });
    let runner = CommandRunner::new(Arc::new(LogEvents(conn.log.clone())));

    let err = runner.run(&conn, "rm x").unwrap_err();

    match err {
        SyncError::Command {
            command,
            output,
            source,
        } => {
            assert_eq!(command, "rm x");
            assert_eq!(output, "rm: cannot remove 'x'\n");
            assert!(matches!(
                source,
                TransportError::ExitStatus { code: Some(1), .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// FileTransferer
// ---------------------------------------------------------------------------

#[test]
fn no_archive_byte_before_readiness() {
    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("a.txt");
    fs::write(&local, "payload").unwrap();
    let conn = FakeConnection::new(Script::default());

    transferer(&conn, &SharedBuffer::default())
        .send(&conn, &local, "/srv/app/a.txt")
        .unwrap();

    let log = conn.log.entries();
    let pipe = conn.log.position("pipe").expect("pipe opened");
    let ready = conn.log.position("ready").expect("readiness fired");
    let first_write = conn.log.position("write").expect("bytes written");
    let run = conn
        .log
        .position("run mkdir -p /srv/app && tar -x -f - -C /srv/app")
        .expect("unpack ran");
    assert!(pipe < ready, "log: {log:?}");
    assert!(ready < first_write, "log: {log:?}");
    assert!(pipe < run, "log: {log:?}");
    assert_eq!(log.iter().filter(|l| *l == "open").count(), 1);
    let last_write = log.iter().rposition(|l| l == "write").expect("bytes written");
    let close = conn.log.position("close").expect("pipe closed");
    assert!(last_write < close, "log: {log:?}");
}

#[test]
fn archive_holds_one_entry_named_after_remote_path() {
    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("source name.txt");
    fs::write(&local, "payload").unwrap();
    set_file_mtime(&local, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let conn = FakeConnection::new(Script::default());

    transferer(&conn, &SharedBuffer::default())
        .send(&conn, &local, "/srv/my app/a b.txt")
        .unwrap();

    assert!(conn
        .log
        .position("run mkdir -p /srv/my\\ app && tar -x -f - -C /srv/my\\ app")
        .is_some());

    let bytes = conn.stdin.take();
    let mut archive = tar::Archive::new(bytes.as_slice());
    let mut entries = archive.entries().unwrap();
    let mut entry = entries.next().expect("one entry").unwrap();
    assert_eq!(entry.path().unwrap().to_str(), Some("a b.txt"));
    assert_eq!(entry.header().mtime().unwrap(), 1_600_000_000);
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "payload");
    drop(entry);
    assert!(entries.next().is_none());
}

#[test]
fn pipe_failure_before_readiness_never_runs_the_unpack() {
    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("a.txt");
    fs::write(&local, "payload").unwrap();
    let conn = FakeConnection::new(Script {
        refuse_pipe: true,
        ..Script::default()
    });

    let err = transferer(&conn, &SharedBuffer::default())
        .send(&conn, &local, "/srv/app/a.txt")
        .unwrap_err();

    assert!(matches!(err, SyncError::Session(_)), "got: {err}");
    let log = conn.log.entries();
    assert!(!log.iter().any(|l| l.starts_with("run")), "log: {log:?}");
    assert!(!log.iter().any(|l| l == "ready"), "log: {log:?}");
}

#[test]
fn unpack_failure_is_reported() {
    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("a.txt");
    fs::write(&local, "payload").unwrap();
    let conn = FakeConnection::new(Script {
        exit_code: Some(2),
        output: "tar: cannot open\n",
        ..Script::default()
    });
    let stdout = SharedBuffer::default();

    let err = transferer(&conn, &stdout)
        .send(&conn, &local, "/srv/app/a.txt")
        .unwrap_err();

    assert!(
        matches!(
            &err,
            SyncError::Command {
                source: TransportError::ExitStatus { code: Some(2), .. },
                ..
            }
        ),
        "got: {err}"
    );
    assert_eq!(stdout.take(), b"tar: cannot open\n");
}

#[test]
fn broken_pipe_mid_stream_wins_over_successful_unpack() {
    let tmp = TempDir::new().unwrap();
    let local = tmp.path().join("a.txt");
    fs::write(&local, "payload").unwrap();
    let conn = FakeConnection::new(Script {
        writes_before_break: Some(1),
        ..Script::default()
    });

    let err = transferer(&conn, &SharedBuffer::default())
        .send(&conn, &local, "/srv/app/a.txt")
        .unwrap_err();

    match err {
        SyncError::Transfer { remote, source, .. } => {
            assert_eq!(remote, "/srv/app/a.txt");
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(conn
        .log
        .position("run mkdir -p /srv/app && tar -x -f - -C /srv/app")
        .is_some());
}

#[test]
fn missing_local_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let conn = FakeConnection::new(Script::default());

    let err = transferer(&conn, &SharedBuffer::default())
        .send(&conn, &tmp.path().join("absent"), "/srv/app/absent")
        .unwrap_err();

    assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    assert!(conn.log.position("pipe").is_none());
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

fn engine(conn: &FakeConnection) -> SyncEngine {
    SyncEngine::new(Arc::new(LogEvents(conn.log.clone())))
        .with_transferer(transferer(conn, &SharedBuffer::default()))
}

#[test]
fn failed_delete_stops_before_any_upload() {
    let local = TempDir::new().unwrap();
    fs::write(local.path().join("a.txt"), "alpha").unwrap();
    let conn = FakeConnection::new(Script {
        exit_code: Some(1),
        fail_on: Some("rm "),
        listing: format!("{EMPTY_SHA1}  ./old.txt\n"),
        ..Script::default()
    });

    let err = engine(&conn)
        .sync_folder(&conn, local.path(), "/srv/app")
        .unwrap_err();

    match err {
        SyncError::Command { command, .. } => assert_eq!(command, "rm /srv/app/old.txt"),
        other => panic!("unexpected error: {other}"),
    }
    let log = conn.log.entries();
    assert_eq!(conn.log.count("open"), 3, "log: {log:?}");
    assert_eq!(conn.log.count("pipe"), 0, "log: {log:?}");
}

#[test]
fn failed_upload_stops_later_uploads() {
    let local = TempDir::new().unwrap();
    fs::write(local.path().join("a.txt"), "alpha").unwrap();
    fs::write(local.path().join("b.txt"), "beta").unwrap();
    let conn = FakeConnection::new(Script {
        exit_code: Some(2),
        fail_on: Some("mkdir -p /srv/app && tar"),
        ..Script::default()
    });

    let err = engine(&conn)
        .sync_folder(&conn, local.path(), "/srv/app")
        .unwrap_err();

    assert!(
        matches!(
            &err,
            SyncError::Command {
                source: TransportError::ExitStatus { code: Some(2), .. },
                ..
            }
        ),
        "got: {err}"
    );
    let log = conn.log.entries();
    assert_eq!(conn.log.count("pipe"), 1, "log: {log:?}");
    assert_eq!(
        conn.log.count("run mkdir -p /srv/app && tar"),
        1,
        "log: {log:?}"
    );
}
