//! Control-plane command queue.
//!
//! # Data Flow
//! ```text
//! ControlHandle (any task, cloneable)
//!     → mpsc::Sender<Command>
//!     → ControlPlane::run (single task, one command at a time)
//!     → SetManager
//!     → oneshot reply
//! ```
//!
//! # Design Decisions
//! - One actor applies every mutation, in arrival order
//! - The queue is bounded; senders wait when it is full
//! - The packet path does not go through the queue

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::schema::EngineConfig;
use crate::control::error::ControlError;
use crate::control::manager::{ReloadSummary, SetManager, SetSummary};
use crate::ipset::{AdtOutcome, Member, SetRequest, TestResult};
use crate::observability::metrics;

type Reply<T> = oneshot::Sender<Result<T, ControlError>>;

pub enum Command {
    Add {
        set: String,
        request: SetRequest,
        reply: Reply<AdtOutcome>,
    },
    Del {
        set: String,
        request: SetRequest,
        reply: Reply<AdtOutcome>,
    },
    Test {
        set: String,
        request: SetRequest,
        reply: Reply<TestResult>,
    },
    List {
        set: String,
        reply: Reply<Vec<Member>>,
    },
    Flush {
        set: String,
        reply: Reply<usize>,
    },
    Reload {
        config: Box<EngineConfig>,
        reply: Reply<ReloadSummary>,
    },
    Sets {
        reply: oneshot::Sender<Vec<SetSummary>>,
    },
}

/// Cloneable sender side of the control queue.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Command>,
}

impl ControlHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ControlError::QueueClosed)?;
        rx.await.map_err(|_| ControlError::QueueClosed)?
    }

    pub async fn add(&self, set: &str, request: SetRequest) -> Result<AdtOutcome, ControlError> {
        let set = set.to_string();
        self.call(|reply| Command::Add { set, request, reply }).await
    }

    pub async fn del(&self, set: &str, request: SetRequest) -> Result<AdtOutcome, ControlError> {
        let set = set.to_string();
        self.call(|reply| Command::Del { set, request, reply }).await
    }

    pub async fn test(&self, set: &str, request: SetRequest) -> Result<TestResult, ControlError> {
        let set = set.to_string();
        self.call(|reply| Command::Test { set, request, reply }).await
    }

    pub async fn list(&self, set: &str) -> Result<Vec<Member>, ControlError> {
        let set = set.to_string();
        self.call(|reply| Command::List { set, reply }).await
    }

    pub async fn flush(&self, set: &str) -> Result<usize, ControlError> {
        let set = set.to_string();
        self.call(|reply| Command::Flush { set, reply }).await
    }

    pub async fn reload(&self, config: EngineConfig) -> Result<ReloadSummary, ControlError> {
        let config = Box::new(config);
        self.call(|reply| Command::Reload { config, reply }).await
    }

    pub async fn sets(&self) -> Result<Vec<SetSummary>, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Sets { reply })
            .await
            .map_err(|_| ControlError::QueueClosed)?;
        rx.await.map_err(|_| ControlError::QueueClosed)
    }
}

/// The single task applying control-plane commands.
pub struct ControlPlane {
    manager: Arc<SetManager>,
    rx: mpsc::Receiver<Command>,
}

impl ControlPlane {
    pub fn new(manager: Arc<SetManager>, depth: usize) -> (Self, ControlHandle) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { manager, rx }, ControlHandle { tx })
    }

    /// Spawn the actor; it stops on shutdown or when every handle is dropped.
    pub fn spawn(
        manager: Arc<SetManager>,
        depth: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (ControlHandle, JoinHandle<()>) {
        let (plane, handle) = Self::new(manager, depth);
        (handle, tokio::spawn(plane.run(shutdown)))
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Control plane started");
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Control plane received shutdown signal");
                    break;
                }
            }
        }
        tracing::info!("Control plane stopped");
    }

    fn handle(&self, command: Command) {
        let m = &self.manager;
        // A dropped receiver means the caller gave up; nothing to report.
        match command {
            Command::Add { set, request, reply } => {
                let _ = reply.send(m.add(&set, &request));
            }
            Command::Del { set, request, reply } => {
                let _ = reply.send(m.del(&set, &request));
            }
            Command::Test { set, request, reply } => {
                let _ = reply.send(m.test(&set, &request));
            }
            Command::List { set, reply } => {
                let _ = reply.send(m.list(&set));
            }
            Command::Flush { set, reply } => {
                let _ = reply.send(m.flush(&set));
            }
            Command::Reload { config, reply } => {
                let result = m.apply_config(&config);
                match &result {
                    Ok(_) => metrics::record_reload("ok"),
                    Err(e) => {
                        metrics::record_reload("failed");
                        tracing::error!(error = %e, "Reload failed. Keeping current sets.");
                    }
                }
                let _ = reply.send(result);
            }
            Command::Sets { reply } => {
                let _ = reply.send(m.summaries());
            }
        }
    }
}
