//! Single-file upload as a one-entry tar stream.
//!
//! ## `FileTransferer::send` protocol
//!
//! 1. Open one session and attach the caller's stdout/stderr sinks.
//! 2. Open and stat the local file.
//! 3. Producer thread: take the session's stdin pipe, wrap it in a tar
//!    builder, then block on the readiness rendezvous.
//! 4. Consumer thread: wait for readiness, then run
//!    `mkdir -p <dir> && tar -x -f - -C <dir>` on the remote side.
//! 5. Producer: write the header and file bytes, finish the archive, close
//!    the pipe. It reports only failures.
//! 6. The first outcome posted to the completion slot is returned.
//!
//! No archive byte is written before step 4 has picked up the readiness
//! signal. If the producer fails before that point the remote command never
//! runs.

use std::fs::{File, Metadata};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tar::{Builder, Header};

use sshsync_core::{Event, Observer};
use sshsync_transport::{Connection, Session, TransportError};

use crate::error::{io_err, SyncError};
use crate::shell;

/// Produces a fresh output sink for each transfer session.
pub type SinkFactory = Arc<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

type SharedSession = Mutex<Box<dyn Session>>;
type Outcome = Result<(), SyncError>;

/// Uploads single files by streaming a tar archive into a remote `tar -x`.
#[derive(Clone)]
pub struct FileTransferer {
    observer: Arc<dyn Observer>,
    stdout: SinkFactory,
    stderr: SinkFactory,
}

impl FileTransferer {
    /// Remote output goes to this process's stdout and stderr.
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self {
            observer,
            stdout: Arc::new(|| -> Box<dyn Write + Send> { Box::new(io::stdout()) }),
            stderr: Arc::new(|| -> Box<dyn Write + Send> { Box::new(io::stderr()) }),
        }
    }

    /// Send remote stdout and stderr somewhere else.
    pub fn with_output(mut self, stdout: SinkFactory, stderr: SinkFactory) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    /// Upload `local` so that it ends up at `remote`, creating the remote
    /// parent directory as needed. The file keeps its mode and mtime.
    ///
    /// Both threads are joined before the outcome is read, so a failure on
    /// one side is only returned once the other side has stopped too. The
    /// session's `run` must therefore return after the stdin pipe is closed
    /// or the remote command exits; a transport that keeps the pipe's reader
    /// open past that point makes `send` hang.
    pub fn send(&self, conn: &dyn Connection, local: &Path, remote: &str) -> Result<(), SyncError> {
        let mut session = conn.open_session()?;
        session.set_stdout((self.stdout)());
        session.set_stderr((self.stderr)());

        let file = File::open(local).map_err(|e| io_err(local, e))?;
        let meta = file.metadata().map_err(|e| io_err(local, e))?;

        self.observer.event(&Event::TransferStarted { local, remote });

        let dir = shell::escape(shell::parent(remote));
        let command = format!("mkdir -p {dir} && tar -x -f - -C {dir}");
        let entry = Entry {
            file,
            meta,
            name: shell::base_name(remote),
            local,
            remote,
        };

        let session: SharedSession = Mutex::new(session);
        let (ready_tx, ready_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<Outcome>(1);
        let observer = self.observer.as_ref();

        thread::scope(|scope| {
            let producer_done = done_tx.clone();
            let session = &session;
            let command = command.as_str();

            let producer =
                scope.spawn(move || produce(session, ready_tx, producer_done, entry, observer));
            let consumer = scope.spawn(move || {
                if let Some(result) = consume(session, ready_rx, command) {
                    let _ = done_tx.try_send(result);
                }
            });

            let _ = producer.join();
            let _ = consumer.join();
        });

        done_rx.try_recv().unwrap_or_else(|_| {
            Err(SyncError::Aborted {
                remote: remote.to_owned(),
            })
        })
    }
}

/// The file being sent plus the bookkeeping the producer needs.
struct Entry<'a> {
    file: File,
    meta: Metadata,
    name: &'a str,
    local: &'a Path,
    remote: &'a str,
}

fn lock(session: &SharedSession) -> Result<MutexGuard<'_, Box<dyn Session>>, SyncError> {
    session
        .lock()
        .map_err(|_| SyncError::Session(TransportError::Other("session lock poisoned".into())))
}

/// Producer side. Dropping `ready` without sending tells the consumer to
/// stand down.
fn produce(
    session: &SharedSession,
    ready: Sender<()>,
    done: Sender<Outcome>,
    mut entry: Entry<'_>,
    observer: &dyn Observer,
) {
    let pipe = match lock(session).and_then(|mut s| s.stdin_pipe().map_err(SyncError::from)) {
        Ok(pipe) => pipe,
        Err(err) => {
            let _ = done.try_send(Err(err));
            return;
        }
    };
    let mut archive = Builder::new(pipe);

    if ready.send(()).is_err() {
        return;
    }
    observer.event(&Event::TransferReady {
        remote: entry.remote,
    });

    // Report before the builder is dropped, since dropping pads the stream.
    if let Err(source) = write_entry(&mut archive, &mut entry) {
        let _ = done.try_send(Err(SyncError::Transfer {
            local: entry.local.to_path_buf(),
            remote: entry.remote.to_owned(),
            source,
        }));
    }
}

fn write_entry(
    archive: &mut Builder<Box<dyn Write + Send>>,
    entry: &mut Entry<'_>,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_metadata(&entry.meta);
    archive.append_data(&mut header, entry.name, &mut entry.file)?;
    archive.finish()?;
    archive.get_mut().flush()
}

/// Consumer side. Returns `None` when readiness never came.
fn consume(session: &SharedSession, ready: Receiver<()>, command: &str) -> Option<Outcome> {
    ready.recv().ok()?;
    let result = lock(session).and_then(|mut guard| {
        guard
            .run(command)
            .map_err(|source| SyncError::Command {
                command: command.to_owned(),
                output: String::new(),
                source,
            })
    });
    Some(result)
}
