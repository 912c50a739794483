//! Background launch-and-poll worker for the Resolve bridge.
//! （在背景啟動 Resolve 並輪詢橋接直到可用。）
//!
//! The worker launches the application once, then re-runs the caller's attempt
//! every `interval` until it succeeds, fails terminally, runs out of attempts or
//! is cancelled. Progress arrives over a channel: any number of
//! [`WorkerEvent::Status`] followed by exactly one [`WorkerEvent::Finished`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::bridge::BridgeError;
use crate::launch::LaunchError;

const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Poll interval and attempt bound; together they cap the worst-case wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 30,
        }
    }
}

/// Worker state machine phases.
/// （工作者狀態機的階段。）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Launching,
    Polling,
    Connected,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkerPhase::Launching => "launching",
            WorkerPhase::Polling => "polling",
            WorkerPhase::Connected => "connected",
            WorkerPhase::Failed => "failed",
            WorkerPhase::TimedOut => "timed out",
            WorkerPhase::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Incremental progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub phase: WorkerPhase,
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
    pub message: String,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}s] {}", self.elapsed.as_secs(), self.phase)?;
        if self.phase == WorkerPhase::Polling {
            write!(f, " (attempt {}/{})", self.attempt, self.max_attempts)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Terminal notification.
/// （終止通知：成功旗標與訊息。）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub phase: WorkerPhase,
    /// Number of attempts actually made.
    pub attempts: u32,
    pub elapsed: Duration,
    pub message: String,
}

impl WorkerReport {
    pub fn success(&self) -> bool {
        self.phase == WorkerPhase::Connected
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Status(WorkerStatus),
    Finished(WorkerReport),
}

/// Runs the state machine on the calling thread.
///
/// `sleep` is called with the poll interval before every attempt; `notify`
/// receives every event, the terminal one included. `cancel` is checked before
/// and after each sleep.
pub fn drive<L, A, S, N>(
    launch: L,
    mut attempt: A,
    policy: RetryPolicy,
    cancel: &AtomicBool,
    mut sleep: S,
    mut notify: N,
) -> WorkerReport
where
    L: FnOnce() -> Result<(), LaunchError>,
    A: FnMut() -> Result<String, BridgeError>,
    S: FnMut(Duration),
    N: FnMut(WorkerEvent),
{
    let started = Instant::now();
    let finish = |phase: WorkerPhase, attempts: u32, message: String| {
        let report = WorkerReport {
            phase,
            attempts,
            elapsed: started.elapsed(),
            message,
        };
        log::info!("retry worker {phase} after {attempts} attempt(s): {}", report.message);
        report
    };

    notify(WorkerEvent::Status(WorkerStatus {
        phase: WorkerPhase::Launching,
        attempt: 0,
        max_attempts: policy.max_attempts,
        elapsed: started.elapsed(),
        message: String::new(),
    }));
    if let Err(err) = launch() {
        let report = finish(WorkerPhase::Failed, 0, format!("launch failed: {err}"));
        notify(WorkerEvent::Finished(report.clone()));
        return report;
    }

    let mut last_error = String::from("waiting for the application");
    let mut attempts = 0;
    let report = loop {
        if attempts >= policy.max_attempts {
            break finish(
                WorkerPhase::TimedOut,
                attempts,
                format!("gave up after {attempts} attempt(s): {last_error}"),
            );
        }
        if cancel.load(Ordering::SeqCst) {
            break finish(WorkerPhase::Cancelled, attempts, "cancelled".to_string());
        }
        notify(WorkerEvent::Status(WorkerStatus {
            phase: WorkerPhase::Polling,
            attempt: attempts + 1,
            max_attempts: policy.max_attempts,
            elapsed: started.elapsed(),
            message: last_error.clone(),
        }));
        sleep(policy.interval);
        if cancel.load(Ordering::SeqCst) {
            break finish(WorkerPhase::Cancelled, attempts, "cancelled".to_string());
        }

        attempts += 1;
        match attempt() {
            Ok(message) => break finish(WorkerPhase::Connected, attempts, message),
            Err(err) if err.is_retryable() => {
                log::debug!("attempt {attempts}/{} not ready: {err}", policy.max_attempts);
                last_error = err.to_string();
            }
            Err(err) => break finish(WorkerPhase::Failed, attempts, err.to_string()),
        }
    };
    notify(WorkerEvent::Finished(report.clone()));
    report
}

/// Owner's handle on a running worker. Dropping it detaches the thread, which
/// still runs to a terminal state.
/// （背景工作者的控制代碼。）
pub struct WorkerHandle {
    events: Receiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Requests cancellation; the worker ends in [`WorkerPhase::Cancelled`]
    /// unless it reaches another terminal state first.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the worker finishes and returns its terminal report.
    pub fn wait(self) -> WorkerReport {
        self.thread.join().unwrap_or_else(|_| WorkerReport {
            phase: WorkerPhase::Failed,
            attempts: 0,
            elapsed: Duration::ZERO,
            message: "retry worker panicked".to_string(),
        })
    }
}

/// Starts the worker on its own thread.
/// （在獨立執行緒啟動工作者。）
pub fn spawn<L, A>(launch: L, attempt: A, policy: RetryPolicy) -> WorkerHandle
where
    L: FnOnce() -> Result<(), LaunchError> + Send + 'static,
    A: FnMut() -> Result<String, BridgeError> + Send + 'static,
{
    let (sender, events) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let thread = thread::spawn(move || {
        drive(
            launch,
            attempt,
            policy,
            &flag,
            |interval| sleep_unless_cancelled(interval, &flag),
            |event| {
                let _ = sender.send(event);
            },
        )
    });
    WorkerHandle {
        events,
        cancel,
        thread,
    }
}

fn sleep_unless_cancelled(interval: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !cancel.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(CANCEL_CHECK_SLICE.min(deadline - now));
    }
}
