//! Single execution context shared by the webhook and the scheduler.
//!
//! [`Bridge::start`] spawns one OS thread running a current-thread Tokio
//! runtime with exactly one consumer draining one channel. Producers call the
//! non-blocking [`Bridge::submit`] from any thread and never wait for the work
//! itself. Jobs run one after another in channel order, so each producer's
//! submissions keep their order; nothing is ordered across producers.
//!
//! Lifecycle: `new` (not ready) -> `start` (ready) -> `shutdown` (not ready,
//! queued jobs drained, thread joined).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn};
use tracing_futures::Instrument;

use crate::command::Command;

pub type JobId = u64;

/// Chat identifier on the messaging platform.
pub type Recipient = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Webhook,
    Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Command(Command),
    ScheduledGold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub origin: Origin,
    pub recipient: Recipient,
    pub request: Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Running,
    Delivered,
    Failed,
}

/// Turns a request into message text. Failures must come back as text.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &Request) -> String;
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<()>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// The loop is not running; the caller may try again later.
    #[error("bridge is not ready")]
    NotReady,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
}

struct Envelope {
    id: JobId,
    item: WorkItem,
}

#[derive(Default)]
struct Inner {
    // Some(_) == ready
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone, Default)]
pub struct Bridge {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the loop thread. Errors if already started.
    pub fn start(&self, renderer: Arc<dyn Renderer>, delivery: Arc<dyn Delivery>) -> Result<()> {
        let mut sender = lock(&self.inner.sender);
        if sender.is_some() {
            bail!("bridge already started");
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build bridge runtime")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);

        let handle = std::thread::Builder::new()
            .name("bridge-loop".into())
            .spawn(move || runtime.block_on(run_loop(rx, renderer, delivery, inner)))
            .context("failed to spawn bridge thread")?;

        *lock(&self.inner.worker) = Some(handle);
        *sender = Some(tx);

        info!("bridge ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.inner.sender).is_some()
    }

    /// Hand a job to the loop without waiting for it.
    pub fn submit(&self, item: WorkItem) -> Result<JobId, BridgeError> {
        let mut sender = lock(&self.inner.sender);
        let Some(tx) = sender.as_ref() else {
            debug!(origin = ?item.origin, "submit rejected, bridge not ready");
            return Err(BridgeError::NotReady);
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let origin = item.origin;

        if tx.send(Envelope { id, item }).is_err() {
            // loop is gone
            *sender = None;
            error!(job_id = id, ?origin, "bridge loop stopped, no longer ready");
            return Err(BridgeError::NotReady);
        }

        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = id, ?origin, state = ?JobState::Submitted, "job queued");
        Ok(id)
    }

    /// Stop accepting work, let queued jobs finish, join the loop thread.
    ///
    /// Blocks the calling thread until the queue is drained.
    pub fn shutdown(&self) {
        let sender = lock(&self.inner.sender).take();
        drop(sender);

        let worker = lock(&self.inner.worker).take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                error!("bridge thread panicked");
            }
            info!(stats = ?self.stats(), "bridge stopped");
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    renderer: Arc<dyn Renderer>,
    delivery: Arc<dyn Delivery>,
    inner: Arc<Inner>,
) {
    info!("bridge loop started");

    while let Some(Envelope { id, item }) = rx.recv().await {
        let span = info_span!(
            "job",
            job_id = id,
            origin = ?item.origin,
            recipient = item.recipient
        );

        // Own task so a panic stays inside this job.
        let task = tokio::spawn(
            execute(item, Arc::clone(&renderer), Arc::clone(&delivery)).instrument(span),
        );

        let state = match task.await {
            Ok(state) => state,
            Err(e) => {
                error!(job_id = id, error = %e, "job aborted");
                JobState::Failed
            }
        };

        match state {
            JobState::Delivered => inner.delivered.fetch_add(1, Ordering::Relaxed),
            _ => inner.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    info!("bridge loop drained");
}

async fn execute(
    item: WorkItem,
    renderer: Arc<dyn Renderer>,
    delivery: Arc<dyn Delivery>,
) -> JobState {
    debug!(state = ?JobState::Running, "job running");

    let text = renderer.render(&item.request).await;

    match delivery.deliver(item.recipient, &text).await {
        Ok(()) => {
            info!(state = ?JobState::Delivered, chars = text.len(), "job delivered");
            JobState::Delivered
        }
        Err(e) => {
            // never retried
            warn!(state = ?JobState::Failed, error = ?e, "delivery failed, dropping");
            JobState::Failed
        }
    }
}
