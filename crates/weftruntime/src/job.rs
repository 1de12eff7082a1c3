use crate::error::ExecutionError;
use crate::repository::Entity;
use crate::task::Task;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub type JobId = Uuid;

/// One step in a job's life. `Submitted` is the entry state; `Completed`,
/// `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Submitted,
    Blocked,
    Pending,
    Running,
    Cancelled,
    Failed,
    Completed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Submitted => "submitted",
            Status::Blocked => "blocked",
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
            Status::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Callback fired on every status change of a job it is subscribed to.
pub type JobCallback = Arc<dyn Fn(&Job) + Send + Sync>;

/// One execution of a task.
///
/// Cloning is cheap and shares the same instance. Status moves only
/// forward; subscribers are notified after each transition, outside the
/// job's lock.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    task: Task,
    creation_date: DateTime<Utc>,
    state: Arc<Mutex<JobState>>,
}

struct JobState {
    status: Status,
    exceptions: Vec<ExecutionError>,
    subscribers: Vec<JobCallback>,
}

impl Job {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            creation_date: Utc::now(),
            state: Arc::new(Mutex::new(JobState {
                status: Status::Submitted,
                exceptions: Vec::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// Failures recorded while running the task function.
    pub fn exceptions(&self) -> Vec<ExecutionError> {
        self.state.lock().exceptions.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_blocked(&self) -> bool {
        self.status() == Status::Blocked
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Status::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == Status::Cancelled
    }

    /// Registers a callback for every future status change. If the job has
    /// already left `Submitted`, the callback is immediately invoked once
    /// with the current status so late subscribers catch up.
    pub fn on_status_change(&self, callback: JobCallback) {
        let catch_up = {
            let mut state = self.state.lock();
            state.subscribers.push(callback.clone());
            state.status != Status::Submitted
        };
        if catch_up {
            callback(self);
        }
    }

    /// Moves to `Blocked`, unless the job has already moved on: between
    /// parking and this call a producer may finish, resume the job and run
    /// it, and a stale `Blocked` must never overwrite that progress.
    pub(crate) fn blocked(&self) {
        let notify = {
            let mut state = self.state.lock();
            if state.status != Status::Submitted {
                return;
            }
            state.status = Status::Blocked;
            state.subscribers.clone()
        };
        tracing::debug!(job_id = %self.id, status = %Status::Blocked, "job status changed");
        for callback in notify {
            callback(self);
        }
    }

    pub(crate) fn pending(&self) {
        self.transition(Status::Pending);
    }

    pub(crate) fn completed(&self) {
        self.transition(Status::Completed);
    }

    pub(crate) fn failed(&self) {
        self.transition(Status::Failed);
    }

    /// Moves to `Running` unless the job was cancelled (or otherwise
    /// finished) in the meantime. Returns whether the job should run.
    pub(crate) fn start_running(&self) -> bool {
        let notify = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return false;
            }
            state.status = Status::Running;
            state.subscribers.clone()
        };
        for callback in notify {
            callback(self);
        }
        true
    }

    /// Moves to `Cancelled` unless the job already runs or finished.
    /// Returns whether the cancellation took effect.
    pub(crate) fn try_cancel(&self) -> bool {
        let notify = {
            let mut state = self.state.lock();
            if state.status == Status::Running || state.status.is_terminal() {
                return false;
            }
            state.status = Status::Cancelled;
            state.subscribers.clone()
        };
        for callback in notify {
            callback(self);
        }
        true
    }

    pub(crate) fn record_exception(&self, error: ExecutionError) {
        self.state.lock().exceptions.push(error);
    }

    /// Terminal states are final: a transition requested after the job
    /// completed, failed or was cancelled is ignored.
    fn transition(&self, status: Status) {
        let notify = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return;
            }
            state.status = status;
            state.subscribers.clone()
        };
        tracing::debug!(job_id = %self.id, status = %status, "job status changed");
        for callback in notify {
            callback(self);
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.creation_date
            .cmp(&other.creation_date)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("task", &self.task.config_name())
            .field("status", &self.status())
            .field("creation_date", &self.creation_date)
            .finish()
    }
}

impl Entity for Job {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "task_id" => Some(self.task.id().to_string()),
            "task_config_name" => Some(self.task.config_name().to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use weftcore::{TaskOutput, Value};

    fn job() -> Job {
        Job::new(Task::new(
            "t",
            vec![],
            Arc::new(|_| Ok(TaskOutput::Single(Value::Null))),
            vec![],
            None,
            Default::default(),
        ))
    }

    #[test]
    fn new_job_is_submitted() {
        let job = job();
        assert_eq!(job.status(), Status::Submitted);
        assert!(!job.is_finished());
    }

    #[test]
    fn subscribers_observe_every_transition() {
        let job = job();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        job.on_status_change(Arc::new(move |j: &Job| sink.lock().push(j.status())));
        job.blocked();
        job.pending();
        assert!(job.start_running());
        job.completed();
        assert_eq!(
            *seen.lock(),
            vec![Status::Blocked, Status::Pending, Status::Running, Status::Completed]
        );
    }

    #[test]
    fn late_subscriber_catches_up_once() {
        let job = job();
        job.pending();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        job.on_status_change(Arc::new(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn cancel_loses_against_running() {
        let job = job();
        job.pending();
        assert!(job.start_running());
        assert!(!job.try_cancel());
        assert_eq!(job.status(), Status::Running);
    }

    #[test]
    fn running_loses_against_cancel() {
        let job = job();
        job.pending();
        assert!(job.try_cancel());
        assert!(!job.start_running());
        assert_eq!(job.status(), Status::Cancelled);
    }

    #[test]
    fn finished_job_never_goes_back_to_blocked() {
        let job = job();
        job.pending();
        assert!(job.start_running());
        job.completed();
        // The submitter may report the parked status after a fast producer
        // already resumed and ran the job.
        job.blocked();
        assert_eq!(job.status(), Status::Completed);
    }

    #[test]
    fn blocked_only_applies_to_a_submitted_job() {
        let job = job();
        job.pending();
        job.blocked();
        assert_eq!(job.status(), Status::Pending);
    }

    #[test]
    fn terminal_status_is_never_overwritten() {
        let job = job();
        assert!(job.try_cancel());
        job.pending();
        assert_eq!(job.status(), Status::Cancelled);
        assert!(!job.start_running());
        job.completed();
        assert_eq!(job.status(), Status::Cancelled);
    }

    #[test]
    fn jobs_order_by_creation_date() {
        let first = job();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = job();
        assert!(first < second);
    }
}
