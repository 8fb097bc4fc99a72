//! @ai:module:intent FIFO request scheduler that throttles per provider and requeues rate-limited work
//! @ai:module:layer application
//! @ai:module:public_api Scheduler, SchedulerConfig, DispatchMode, SubmitHandle
//! @ai:module:stateless false

use crate::error::{ClassifiedError, ErrorKind, Result};
use crate::queue::rate_limit::{RateLimitState, WindowPolicy};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// @ai:intent How many entries may be in flight at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// At most one entry in flight system-wide; a waiting head blocks every provider
    #[default]
    Serial,
    /// At most one entry in flight per provider; idle providers are not held up by busy ones
    PerProvider,
}

/// @ai:intent Scheduler tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub dispatch: DispatchMode,
    pub window: WindowPolicy,
    /// None requeues rate-limited work indefinitely
    pub max_requeues: Option<u32>,
}

/// Type-erased unit of work. `run` may be called again after a rate-limit failure.
trait Job: Send {
    fn run(&mut self) -> BoxFuture<'_, Result<()>>;
    fn fulfill(self: Box<Self>);
    fn reject(self: Box<Self>, error: ClassifiedError);
}

struct PendingJob<T, F> {
    work: F,
    value: Option<T>,
    reply: Option<oneshot::Sender<Result<T>>>,
}

impl<T, F, Fut> Job for PendingJob<T, F>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    fn run(&mut self) -> BoxFuture<'_, Result<()>> {
        // The closure is invoked inside the future so a panic in it is caught with the rest.
        Box::pin(async move {
            let value = (self.work)().await?;
            self.value = Some(value);
            Ok::<(), ClassifiedError>(())
        })
    }

    fn fulfill(mut self: Box<Self>) {
        if let (Some(reply), Some(value)) = (self.reply.take(), self.value.take()) {
            // The caller may have dropped its handle; nothing to deliver then.
            let _ = reply.send(Ok(value));
        }
    }

    fn reject(mut self: Box<Self>, error: ClassifiedError) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(error));
        }
    }
}

struct QueueEntry {
    seq: u64,
    provider: String,
    enqueued_at: DateTime<Utc>,
    requeues: u32,
    job: Box<dyn Job>,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    in_flight: HashSet<String>,
    limits: HashMap<String, RateLimitState>,
    /// Queued plus in-flight entries
    pending: usize,
    next_seq: u64,
}

enum Step {
    Run(QueueEntry),
    WaitUntil(Instant),
    Idle,
}

enum Settled {
    Fulfilled(QueueEntry),
    Rejected(QueueEntry, ClassifiedError),
    Requeued,
}

impl QueueState {
    /// @ai:intent Pick the earliest entry whose provider is idle and not window-blocked
    /// @ai:effects state:write
    fn next_step(&mut self, now: Instant, config: &SchedulerConfig) -> Step {
        if self.entries.is_empty() {
            return Step::Idle;
        }
        if config.dispatch == DispatchMode::Serial && !self.in_flight.is_empty() {
            return Step::Idle;
        }

        let (chosen, earliest) = {
            let mut held: HashSet<&str> = HashSet::new();
            let mut earliest: Option<Instant> = None;
            let mut chosen = None;

            for (index, entry) in self.entries.iter().enumerate() {
                let provider = entry.provider.as_str();
                if held.contains(provider) {
                    continue;
                }
                if self.in_flight.contains(provider) {
                    held.insert(provider);
                    continue;
                }

                let blocked = self
                    .limits
                    .get(provider)
                    .and_then(|state| state.blocked_until(now, &config.window));
                if let Some(until) = blocked {
                    earliest = Some(earliest.map_or(until, |e: Instant| e.min(until)));
                    if config.dispatch == DispatchMode::Serial {
                        break;
                    }
                    held.insert(provider);
                    continue;
                }

                chosen = Some(index);
                break;
            }
            (chosen, earliest)
        };

        match chosen.and_then(|index| self.entries.remove(index)) {
            Some(entry) => {
                self.in_flight.insert(entry.provider.clone());
                Step::Run(entry)
            }
            None => earliest.map_or(Step::Idle, Step::WaitUntil),
        }
    }

    /// @ai:intent Put a rate-limited entry back ahead of everything submitted after it
    /// @ai:effects state:write
    fn requeue(&mut self, entry: QueueEntry) {
        let position = self
            .entries
            .iter()
            .position(|queued| queued.seq > entry.seq)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    fn limit_for(&mut self, provider: &str) -> &mut RateLimitState {
        self.limits.entry(provider.to_string()).or_default()
    }
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    config: SchedulerConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Dispatcher(JoinHandle<()>);

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// @ai:intent Serializing request queue shared by all provider calls
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    _dispatcher: Arc<Dispatcher>,
}

impl Scheduler {
    /// @ai:intent Start a scheduler and its dispatcher task
    /// @ai:pre called within a Tokio runtime
    /// @ai:effects spawn
    pub fn new(config: SchedulerConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            config,
        });
        let dispatcher = tokio::spawn(dispatch_loop(shared.clone()));

        Self {
            shared,
            _dispatcher: Arc::new(Dispatcher(dispatcher)),
        }
    }

    /// @ai:intent Queue a unit of work for a provider; the handle resolves exactly once
    /// @ai:effects state:write
    pub fn submit<T, F, Fut>(&self, provider: impl Into<String>, work: F) -> SubmitHandle<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let provider = provider.into();
        let (reply, receiver) = oneshot::channel();

        {
            let mut state = self.shared.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.entries.push_back(QueueEntry {
                seq,
                provider: provider.clone(),
                enqueued_at: Utc::now(),
                requeues: 0,
                job: Box::new(PendingJob {
                    work,
                    value: None,
                    reply: Some(reply),
                }),
            });
            state.pending += 1;
            tracing::debug!(provider = %provider, seq, pending = state.pending, "work submitted");
        }
        self.shared.wake.notify_one();

        SubmitHandle { provider, receiver }
    }

    /// @ai:intent Entries submitted but not yet fulfilled or rejected
    /// @ai:effects pure
    pub fn len(&self) -> usize {
        self.shared.lock().pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// @ai:intent Snapshot of a provider's window, if one was ever recorded
    /// @ai:effects pure
    pub fn rate_limit_state(&self, provider: &str) -> Option<RateLimitState> {
        self.shared.lock().limits.get(provider).cloned()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}

/// @ai:intent Caller's pending result for one submitted unit
#[derive(Debug)]
pub struct SubmitHandle<T> {
    provider: String,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> SubmitHandle<T> {
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl<T> Future for SubmitHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClassifiedError::new(
                ErrorKind::Generic,
                self.provider.as_str(),
                "scheduler shut down before the request completed",
            ))),
        }
    }
}

/// @ai:intent Drain the queue for the scheduler's lifetime
/// @ai:effects spawn, time
async fn dispatch_loop(shared: Arc<Shared>) {
    loop {
        let step = shared.lock().next_step(Instant::now(), &shared.config);

        match step {
            Step::Run(entry) => {
                let waited = Utc::now() - entry.enqueued_at;
                tracing::debug!(
                    provider = %entry.provider,
                    seq = entry.seq,
                    queued_ms = waited.num_milliseconds(),
                    "draining entry"
                );
                tokio::spawn(run_entry(shared.clone(), entry));
            }
            Step::WaitUntil(deadline) => {
                tracing::debug!(
                    "waiting {:?} for a rate-limit window to reset",
                    deadline.saturating_duration_since(Instant::now())
                );
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            Step::Idle => shared.wake.notified().await,
        }
    }
}

/// @ai:intent Run one entry to completion and settle it
/// @ai:effects network, state:write
async fn run_entry(shared: Arc<Shared>, mut entry: QueueEntry) {
    let caught = AssertUnwindSafe(entry.job.run()).catch_unwind().await;
    let outcome = match caught {
        Ok(outcome) => outcome,
        Err(panic) => Err(ClassifiedError::new(
            ErrorKind::Generic,
            entry.provider.as_str(),
            format!("work panicked: {}", panic_message(panic.as_ref())),
        )),
    };
    let now = Instant::now();
    let config = &shared.config;

    let settled = {
        let mut state = shared.lock();
        match outcome {
            Ok(()) => {
                state.limit_for(&entry.provider).record_success(now, &config.window);
                state.pending -= 1;
                Settled::Fulfilled(entry)
            }
            Err(err) if err.is_rate_limit() => {
                state
                    .limit_for(&entry.provider)
                    .record_rate_limit(now, err.details.retry_after, &config.window);

                let within_ceiling = config
                    .max_requeues
                    .map_or(true, |max| entry.requeues < max);
                if within_ceiling {
                    entry.requeues += 1;
                    tracing::warn!(
                        provider = %entry.provider,
                        seq = entry.seq,
                        requeues = entry.requeues,
                        "rate limited; requeued until the provider window resets"
                    );
                    state.in_flight.remove(&entry.provider);
                    state.requeue(entry);
                    Settled::Requeued
                } else {
                    tracing::warn!(
                        provider = %entry.provider,
                        seq = entry.seq,
                        "rate limited {} times; giving up",
                        entry.requeues + 1
                    );
                    state.pending -= 1;
                    Settled::Rejected(entry, err)
                }
            }
            Err(err) => {
                tracing::warn!(provider = %entry.provider, seq = entry.seq, "request rejected: {}", err);
                state.pending -= 1;
                Settled::Rejected(entry, err)
            }
        }
    };

    let finished = match settled {
        Settled::Fulfilled(QueueEntry { provider, job, .. }) => {
            job.fulfill();
            Some(provider)
        }
        Settled::Rejected(QueueEntry { provider, job, .. }, err) => {
            job.reject(err);
            Some(provider)
        }
        Settled::Requeued => None,
    };

    // The provider stays in flight until its caller has been resolved.
    if let Some(provider) = finished {
        shared.lock().in_flight.remove(&provider);
    }
    shared.wake.notify_one();
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
