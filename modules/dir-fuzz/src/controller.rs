//! Scan controller: owns the run state and drives the wordlist loop on a worker task.
//!
//! A run moves `Idle -> Running -> {Completed, Cancelled} -> Idle`. Only one worker may be
//! active at a time. Cancellation is cooperative: the worker checks the run's token before
//! each attempt, so an in-flight request always finishes first.

use crate::classify::classify;
use crate::dispatch::Dispatch;
use crate::error::FuzzError;
use crate::events::{EventSink, FuzzResult, ScanStatus};
use crate::http::{Http1Parser, ParseResponse};
use crate::request::BaseRequest;
use crate::template::Templater;
use crate::wordlist;
use pathfuzz_core::{CancelToken, RateLimiter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

pub struct ScanOptions {
    /// Requests per second; 0 disables pacing.
    pub qps: u32,
    pub parser: Arc<dyn ParseResponse>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions { qps: 0, parser: Arc::new(Http1Parser) }
    }
}

/// Cheap to clone; clones drive the same run state.
#[derive(Clone)]
pub struct ScanController {
    shared: Arc<Shared>,
}

struct Shared {
    dispatcher: Arc<dyn Dispatch>,
    sink: Arc<dyn EventSink>,
    parser: Arc<dyn ParseResponse>,
    limiter: Option<RateLimiter>,
    base: Mutex<Option<Arc<BaseRequest>>>,
    wordlist: Mutex<Arc<Vec<String>>>,
    results: Mutex<Vec<FuzzResult>>,
    progress: AtomicU8,
    running: AtomicBool,
    token: Mutex<CancelToken>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Integer percentage, truncated.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

impl ScanController {
    pub fn new(dispatcher: Arc<dyn Dispatch>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_options(dispatcher, sink, ScanOptions::default())
    }

    pub fn with_options(dispatcher: Arc<dyn Dispatch>, sink: Arc<dyn EventSink>, opts: ScanOptions) -> Self {
        let limiter = if opts.qps == 0 { None } else { Some(RateLimiter::new(opts.qps)) };
        ScanController {
            shared: Arc::new(Shared {
                dispatcher,
                sink,
                parser: opts.parser,
                limiter,
                base: Mutex::new(None),
                wordlist: Mutex::new(Arc::new(wordlist::default_wordlist())),
                results: Mutex::new(Vec::new()),
                progress: AtomicU8::new(0),
                running: AtomicBool::new(false),
                token: Mutex::new(CancelToken::new()),
            }),
        }
    }

    /// Set the base request for subsequent runs. A run already in progress keeps its own.
    pub fn capture(&self, base: BaseRequest) {
        let url = base.url();
        *lock(&self.shared.base) = Some(Arc::new(base));
        info!(%url, "target captured");
        self.shared.sink.on_status(ScanStatus::TargetCaptured(url));
    }

    pub fn base(&self) -> Option<Arc<BaseRequest>> {
        lock(&self.shared.base).clone()
    }

    /// Replace the wordlist with the contents of `path`. On error the current list is kept.
    pub fn import_wordlist(&self, path: impl AsRef<Path>) -> Result<usize, FuzzError> {
        let words = wordlist::load(path)?;
        Ok(self.set_wordlist(words))
    }

    pub fn set_wordlist(&self, words: Vec<String>) -> usize {
        let n = words.len();
        *lock(&self.shared.wordlist) = Arc::new(words);
        self.shared.sink.on_status(ScanStatus::WordlistImported(n));
        n
    }

    pub fn wordlist_len(&self) -> usize {
        lock(&self.shared.wordlist).len()
    }

    /// Spawn a worker for a new run. Returns `None` without side effects on the run state
    /// when no base request is set or a run is already active.
    ///
    /// Must be called from within a Tokio runtime; the worker is started with `tokio::spawn`.
    pub fn start(&self) -> Option<JoinHandle<RunOutcome>> {
        let Some(base) = self.base() else {
            self.shared.sink.on_status(ScanStatus::NoTarget);
            return None;
        };
        let token = {
            let mut slot = lock(&self.shared.token);
            if self.shared.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
                debug!("start ignored: run already active");
                return None;
            }
            *slot = CancelToken::new();
            slot.clone()
        };
        let words = lock(&self.shared.wordlist).clone();
        self.shared.sink.on_status(ScanStatus::Started);
        let shared = self.shared.clone();
        Some(tokio::spawn(async move { shared.run(base, words, token).await }))
    }

    /// Ask the active run to stop before its next attempt. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let slot = lock(&self.shared.token);
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        slot.cancel();
        info!("cancellation requested");
        true
    }

    /// Clear the result log and progress. An active run is not stopped and keeps appending.
    pub fn reset(&self) {
        lock(&self.shared.results).clear();
        self.shared.progress.store(0, Ordering::SeqCst);
    }

    pub fn results(&self) -> Vec<FuzzResult> {
        lock(&self.shared.results).clone()
    }

    pub fn progress(&self) -> u8 {
        self.shared.progress.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag when the worker exits, including by panic.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    async fn run(&self, base: Arc<BaseRequest>, words: Arc<Vec<String>>, token: CancelToken) -> RunOutcome {
        let _guard = RunGuard(&self.running);
        let templater = Templater::new(&base);
        let total = words.len();
        info!(url = %base.url(), prefix = templater.prefix(), payloads = total, "scan started");

        let mut outcome = RunOutcome::Completed;
        for (i, payload) in words.iter().enumerate() {
            if token.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }
            let result = self.attempt(&base, &templater, payload).await;
            lock(&self.results).push(result.clone());
            self.sink.on_result(result);

            let pct = percent(i + 1, total);
            self.progress.store(pct, Ordering::SeqCst);
            self.sink.on_progress(pct);
        }

        match outcome {
            RunOutcome::Completed => {
                info!(attempts = total, "scan finished");
                self.sink.on_status(ScanStatus::Finished);
            }
            RunOutcome::Cancelled => {
                info!("scan interrupted");
                self.sink.on_status(ScanStatus::Interrupted);
            }
        }
        outcome
    }

    async fn attempt(&self, base: &BaseRequest, templater: &Templater, payload: &str) -> FuzzResult {
        let request = templater.build(payload);
        let started = Instant::now();
        let raw = self.dispatcher.send(base.service(), &request.bytes).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut result = FuzzResult {
            payload: payload.to_string(),
            target_path: request.target_path,
            status: None,
            length: None,
            elapsed_ms,
            malformed: false,
            error: None,
        };
        match raw {
            None => result.error = Some("no response".into()),
            Some(raw) => match self.parser.parse(&raw) {
                None => {
                    warn!(path = %result.target_path, bytes = raw.len(), "unparsable response");
                    result.length = Some(0);
                    result.malformed = true;
                    result.error = Some("unparsable response".into());
                }
                Some(head) => match classify(&raw, head) {
                    Ok(c) => {
                        result.status = Some(c.status);
                        result.length = Some(c.body_length);
                    }
                    Err(e) => {
                        warn!(path = %result.target_path, error = %e, "malformed response");
                        result.status = Some(head.status);
                        result.length = Some(0);
                        result.malformed = true;
                        result.error = Some(e.to_string());
                    }
                },
            },
        }
        debug!(
            path = %result.target_path,
            status = ?result.status,
            length = ?result.length,
            elapsed_ms,
            "attempt"
        );
        result
    }
}
