// Controller - runs a Session on its own control thread, commands in, events out
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::model::{ApplyProgress, ApplyReport};
use crate::scanner::{ScanProgress, ScanReport};
use crate::session::Session;
use crate::types::{BatchStatus, Field, FileRecord, MetaError, Result};

/// What the presentation layer can ask for
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the folder list and rescan
    SetFolders(Vec<PathBuf>),
    AddFolder(PathBuf),
    RemoveFolder(PathBuf),
    Rescan,
    Edit {
        path: PathBuf,
        field: Field,
        value: String,
    },
    Swap(Vec<PathBuf>),
    ClearEdits(PathBuf),
    Apply(Vec<PathBuf>),
    /// Apply every record currently flagged as a mismatch
    ApplyMismatched,
    Shutdown,
}

/// What the presentation layer gets back
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ScanStarted { roots: Vec<PathBuf> },
    ScanProgress(ScanProgress),
    ScanFinished { status: BatchStatus, report: ScanReport },
    /// Records touched by an edit, swap or apply
    RecordsChanged { records: Vec<FileRecord> },
    ApplyProgress(ApplyProgress),
    ApplyFinished { status: BatchStatus, report: ApplyReport },
    CommandFailed { command: String, error: String },
    Stopped,
}

pub struct ControllerHandle {
    commands: Sender<Command>,
    events: Receiver<Event>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Move `session` onto a new control thread
    pub fn spawn(session: Session) -> Result<Self> {
        let (command_tx, command_rx) = channel();
        let (event_tx, event_rx) = channel();
        let cancel = CancellationToken::new();

        let worker = Controller {
            session,
            events: event_tx,
            cancel: cancel.clone(),
        };
        let thread = thread::Builder::new()
            .name("pdfmeta-control".to_string())
            .spawn(move || worker.run(command_rx))?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            cancel,
            thread: Some(thread),
        })
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| {
            MetaError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "control thread has stopped",
            ))
        })
    }

    /// Block until the next event, or None once the control thread is gone
    pub fn next_event(&self, timeout: Duration) -> Option<Event> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop the running scan or apply batch. In-flight files finish; nothing new starts.
    /// Only affects work that has already started: the token is re-armed when the next
    /// scan or apply begins.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.cancel.cancel();
            let _ = self.commands.send(Command::Shutdown);
            if thread.join().is_err() {
                warn!("control thread panicked");
            }
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Controller {
    session: Session,
    events: Sender<Event>,
    cancel: CancellationToken,
}

impl Controller {
    fn run(mut self, commands: Receiver<Command>) {
        info!("control thread started");
        for command in commands {
            debug!(?command, "command received");
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle(command);
        }
        self.emit(Event::Stopped);
        info!("control thread stopped");
    }

    fn emit(&self, event: Event) {
        // a dropped receiver just means nobody is listening any more
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: Command) {
        let label = command_label(&command);
        let outcome = match command {
            Command::SetFolders(roots) => {
                self.session.set_folders(roots);
                self.rescan();
                Ok(Vec::new())
            }
            Command::AddFolder(root) => {
                if self.session.add_folder(root) {
                    self.rescan();
                }
                Ok(Vec::new())
            }
            Command::RemoveFolder(root) => {
                if self.session.remove_folder(&root) {
                    self.rescan();
                }
                Ok(Vec::new())
            }
            Command::Rescan => {
                self.rescan();
                Ok(Vec::new())
            }
            Command::Edit { path, field, value } => self
                .session
                .edit(&path, field, value)
                .map(|record| vec![record.clone()]),
            Command::Swap(paths) => self.session.swap(&paths).map(|()| self.snapshot(&paths)),
            Command::ClearEdits(path) => self.session.clear_edits(&path).map(|record| vec![record.clone()]),
            Command::Apply(paths) => {
                self.apply(paths);
                Ok(Vec::new())
            }
            Command::ApplyMismatched => {
                let paths = self.session.mismatched_paths();
                self.apply(paths);
                Ok(Vec::new())
            }
            Command::Shutdown => Ok(Vec::new()),
        };

        match outcome {
            Ok(records) if !records.is_empty() => self.emit(Event::RecordsChanged { records }),
            Ok(_) => {}
            Err(e) => {
                warn!(command = label, error = %e, "command failed");
                self.emit(Event::CommandFailed {
                    command: label.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn rescan(&mut self) {
        self.cancel.reset();
        self.emit(Event::ScanStarted {
            roots: self.session.roots().to_vec(),
        });
        let events = self.events.clone();
        let report = self.session.rescan(&self.cancel, |progress| {
            let _ = events.send(Event::ScanProgress(progress));
        });
        self.emit(Event::ScanFinished {
            status: report.status(),
            report,
        });
    }

    fn apply(&mut self, paths: Vec<PathBuf>) {
        self.cancel.reset();
        let events = self.events.clone();
        let report = self.session.apply(&paths, &self.cancel, |progress| {
            let _ = events.send(Event::ApplyProgress(progress));
        });
        let touched: Vec<PathBuf> = report.outcomes.iter().map(|o| o.path.clone()).collect();
        let records = self.snapshot(&touched);
        self.emit(Event::ApplyFinished {
            status: report.status(),
            report,
        });
        if !records.is_empty() {
            self.emit(Event::RecordsChanged { records });
        }
    }

    fn snapshot(&self, paths: &[PathBuf]) -> Vec<FileRecord> {
        paths
            .iter()
            .filter_map(|p| self.session.record(p).cloned())
            .collect()
    }
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::SetFolders(_) => "set_folders",
        Command::AddFolder(_) => "add_folder",
        Command::RemoveFolder(_) => "remove_folder",
        Command::Rescan => "rescan",
        Command::Edit { .. } => "edit",
        Command::Swap(_) => "swap",
        Command::ClearEdits(_) => "clear_edits",
        Command::Apply(_) => "apply",
        Command::ApplyMismatched => "apply_mismatched",
        Command::Shutdown => "shutdown",
    }
}
