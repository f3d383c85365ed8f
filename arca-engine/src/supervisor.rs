//! Execution supervisor
//!
//! Runs one external process per pipeline step: one OS thread and one child
//! process per execution, with combined stdout/stderr capture streamed into
//! a FIFO log channel. The registry (execution id -> entry) is mutated by the
//! spawning caller, the worker thread, and any cancelling caller, so all
//! access goes through a single mutex. The supervisor enforces no bound on
//! concurrent executions; the orchestrator throttles.
//!
//! Consumer contract: poll the log queue with a short timeout, emit a
//! heartbeat on timeout, and stop once an entry tagged with a terminal
//! status arrives (or the execution itself reports terminal). Call `remove`
//! after draining to garbage-collect the entry.

use crate::error::{EngineError, Result};
use arca_core::domain::{
    CommandSpec, ExecutionLog, ExecutionResults, ExecutionStatus, LogLevel, classify_line,
};
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// FIFO channel of execution log entries
///
/// Producers (worker thread, canceller) push; the single polling consumer
/// pops with a timeout so it can heartbeat while the process is quiet.
pub struct LogQueue {
    entries: Mutex<VecDeque<ExecutionLog>>,
    available: Condvar,
}

impl LogQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        })
    }

    /// Appends an entry and wakes the consumer
    pub fn push(&self, entry: ExecutionLog) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(entry);
        self.available.notify_one();
    }

    /// Pops the oldest entry, waiting up to `timeout`; `None` on timeout
    pub fn pop_timeout(&self, timeout: Duration) -> Option<ExecutionLog> {
        let mut entries = self.entries.lock().unwrap();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(entry) = entries.pop_front() {
                return Some(entry);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self.available.wait_timeout(entries, remaining).unwrap();
            entries = guard;
            if result.timed_out() && entries.is_empty() {
                return None;
            }
        }
    }
}

/// Read-only view of an execution's current state
#[derive(Debug, Clone)]
pub struct ExecutionSnapshot {
    pub id: String,
    pub command: CommandSpec,
    pub status: ExecutionStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub results: Option<ExecutionResults>,
}

struct ExecutionEntry {
    command: CommandSpec,
    status: ExecutionStatus,
    started_at: chrono::DateTime<chrono::Utc>,
    results: Option<ExecutionResults>,
    /// Live process handle, present only while the process runs; shared with
    /// cancellation so a kill can be requested from another thread
    child: Option<Arc<Mutex<Child>>>,
    logs: Arc<LogQueue>,
}

/// Supervises external-process executions
///
/// Dependency-injected service owned by the orchestrator's composition root.
pub struct ExecutionSupervisor {
    executions: Mutex<HashMap<String, ExecutionEntry>>,
}

impl Default for ExecutionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSupervisor {
    pub fn new() -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an execution and spawns its worker thread
    ///
    /// `expected_outputs` are the paths estimated by the output strategy;
    /// after a successful exit, the ones that exist on disk are attached to
    /// the execution's results.
    pub fn start(
        self: &Arc<Self>,
        execution_id: &str,
        command: CommandSpec,
        expected_outputs: Vec<PathBuf>,
    ) -> Result<()> {
        {
            let mut executions = self.executions.lock().unwrap();
            if executions.contains_key(execution_id) {
                return Err(EngineError::ComponentLaunch {
                    component: command.program.clone(),
                    reason: format!("execution id '{}' already registered", execution_id),
                });
            }
            executions.insert(
                execution_id.to_string(),
                ExecutionEntry {
                    command: command.clone(),
                    status: ExecutionStatus::Starting,
                    started_at: chrono::Utc::now(),
                    results: None,
                    child: None,
                    logs: LogQueue::new(),
                },
            );
        }

        let supervisor = Arc::clone(self);
        let id = execution_id.to_string();
        let program = command.program.clone();
        std::thread::Builder::new()
            .name(format!("exec-{}", execution_id))
            .spawn(move || supervisor.run_worker(&id, command, expected_outputs))
            .map_err(|e| {
                self.executions.lock().unwrap().remove(execution_id);
                EngineError::ComponentLaunch {
                    component: program,
                    reason: format!("failed to spawn worker thread: {}", e),
                }
            })?;

        Ok(())
    }

    /// Worker body: spawn, stream, wait, finalize
    fn run_worker(&self, id: &str, command: CommandSpec, expected_outputs: Vec<PathBuf>) {
        let Some(logs) = self.log_queue(id) else {
            return;
        };
        let start = Instant::now();

        logs.push(ExecutionLog::new(
            LogLevel::Info,
            format!("Launching: {}", command.display()),
            ExecutionStatus::Starting,
        ));

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.set_status(id, ExecutionStatus::Failed);
                logs.push(ExecutionLog::new(
                    LogLevel::Error,
                    format!("Failed to start process: {}", e),
                    ExecutionStatus::Failed,
                ));
                return;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));

        // A cancel may land between spawn and registration; honor it instead
        // of overwriting the terminal status.
        let registered = {
            let mut executions = self.executions.lock().unwrap();
            match executions.get_mut(id) {
                Some(entry) if entry.status != ExecutionStatus::Cancelled => {
                    entry.child = Some(Arc::clone(&child));
                    entry.status = ExecutionStatus::Running;
                    true
                }
                _ => false,
            }
        };
        if !registered {
            if let Err(e) = child.lock().unwrap().kill() {
                warn!("Failed to kill process for {}: {}", id, e);
            }
            let _ = child.lock().unwrap().wait();
            return;
        }
        logs.push(ExecutionLog::new(
            LogLevel::Info,
            "Process started",
            ExecutionStatus::Running,
        ));

        // Stream stderr on a helper thread so both pipes drain concurrently;
        // a full unread pipe would block the child.
        let stderr_handle = stderr.map(|stream| {
            let logs = Arc::clone(&logs);
            std::thread::spawn(move || stream_lines(stream, &logs))
        });
        if let Some(stream) = stdout {
            stream_lines(stream, &logs);
        }
        if let Some(handle) = stderr_handle {
            let _ = handle.join();
        }

        let exit = wait_for_exit(&child);
        let elapsed = start.elapsed();

        let mut executions = self.executions.lock().unwrap();
        let Some(entry) = executions.get_mut(id) else {
            return;
        };
        entry.child = None;

        // Cancellation may have won the race; keep its terminal state.
        if entry.status == ExecutionStatus::Cancelled {
            debug!("Execution {} was cancelled before exit was observed", id);
            return;
        }

        match exit {
            Ok(status) if status.success() => {
                entry.status = ExecutionStatus::Completed;
                entry.results = Some(ExecutionResults {
                    output_files: expected_outputs
                        .into_iter()
                        .filter(|path| path.exists())
                        .collect(),
                });
                logs.push(ExecutionLog::new(
                    LogLevel::Success,
                    format!("Process completed successfully in {:.1}s", elapsed.as_secs_f64()),
                    ExecutionStatus::Completed,
                ));
            }
            Ok(status) => {
                entry.status = ExecutionStatus::Failed;
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                logs.push(ExecutionLog::new(
                    LogLevel::Error,
                    format!(
                        "Process exited with code {} after {:.1}s",
                        code,
                        elapsed.as_secs_f64()
                    ),
                    ExecutionStatus::Failed,
                ));
            }
            Err(e) => {
                entry.status = ExecutionStatus::Failed;
                logs.push(ExecutionLog::new(
                    LogLevel::Error,
                    format!("Failed to wait for process: {}", e),
                    ExecutionStatus::Failed,
                ));
            }
        }
    }

    /// Requests termination of a running execution
    ///
    /// Returns `false` if the execution is unknown or already terminal;
    /// racing a natural completion is expected and not an error.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let (child, logs) = {
            let mut executions = self.executions.lock().unwrap();
            let Some(entry) = executions.get_mut(execution_id) else {
                return false;
            };
            if entry.status.is_terminal() {
                return false;
            }
            entry.status = ExecutionStatus::Cancelled;
            (entry.child.clone(), Arc::clone(&entry.logs))
        };

        if let Some(child) = child {
            if let Err(e) = child.lock().unwrap().kill() {
                warn!("Failed to kill process for {}: {}", execution_id, e);
            }
        }

        logs.push(ExecutionLog::new(
            LogLevel::Warning,
            "Execution cancelled by request",
            ExecutionStatus::Cancelled,
        ));
        true
    }

    /// Read accessor for a polling consumer
    pub fn execution(&self, execution_id: &str) -> Option<ExecutionSnapshot> {
        let executions = self.executions.lock().unwrap();
        executions.get(execution_id).map(|entry| ExecutionSnapshot {
            id: execution_id.to_string(),
            command: entry.command.clone(),
            status: entry.status,
            started_at: entry.started_at,
            results: entry.results.clone(),
        })
    }

    /// The execution's log channel, shared with the worker
    pub fn log_queue(&self, execution_id: &str) -> Option<Arc<LogQueue>> {
        let executions = self.executions.lock().unwrap();
        executions.get(execution_id).map(|entry| Arc::clone(&entry.logs))
    }

    /// Drops an execution once its consumer has finished draining
    pub fn remove(&self, execution_id: &str) -> bool {
        self.executions.lock().unwrap().remove(execution_id).is_some()
    }

    fn set_status(&self, execution_id: &str, status: ExecutionStatus) {
        let mut executions = self.executions.lock().unwrap();
        if let Some(entry) = executions.get_mut(execution_id) {
            entry.status = status;
        }
    }
}

/// Streams a pipe line-by-line into the log queue with classified severity
fn stream_lines(stream: impl Read, logs: &LogQueue) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                logs.push(ExecutionLog::new(
                    classify_line(&line),
                    line,
                    ExecutionStatus::Running,
                ));
            }
            Err(_) => break,
        }
    }
}

/// Waits for the child without holding its mutex across the wait, so a
/// concurrent cancel can still acquire the handle to kill it
fn wait_for_exit(child: &Arc<Mutex<Child>>) -> std::io::Result<std::process::ExitStatus> {
    loop {
        if let Some(status) = child.lock().unwrap().try_wait()? {
            return Ok(status);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: None,
            env: HashMap::new(),
        }
    }

    fn drain_until_terminal(supervisor: &ExecutionSupervisor, id: &str) -> Vec<ExecutionLog> {
        let queue = supervisor.log_queue(id).unwrap();
        let mut collected = Vec::new();
        for _ in 0..200 {
            if let Some(entry) = queue.pop_timeout(Duration::from_millis(100)) {
                let terminal = entry.status.is_terminal();
                collected.push(entry);
                if terminal {
                    return collected;
                }
            } else if supervisor
                .execution(id)
                .map(|s| s.status.is_terminal())
                .unwrap_or(true)
            {
                return collected;
            }
        }
        panic!("execution {} never reached a terminal status", id);
    }

    #[test]
    fn test_successful_execution() {
        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor
            .start("e1", sh("echo hello; echo conversion finished"), Vec::new())
            .unwrap();

        let logs = drain_until_terminal(&supervisor, "e1");
        let snapshot = supervisor.execution("e1").unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Completed);
        assert!(logs.iter().any(|l| l.message.contains("hello")));
        assert!(
            logs.iter()
                .any(|l| l.level == LogLevel::Success && l.message.contains("finished"))
        );
        // Final summary carries the terminal status
        assert_eq!(logs.last().unwrap().status, ExecutionStatus::Completed);

        assert!(supervisor.remove("e1"));
        assert!(supervisor.execution("e1").is_none());
    }

    #[test]
    fn test_failed_execution() {
        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor.start("e2", sh("exit 3"), Vec::new()).unwrap();

        let logs = drain_until_terminal(&supervisor, "e2");
        assert_eq!(
            supervisor.execution("e2").unwrap().status,
            ExecutionStatus::Failed
        );
        let summary = logs.last().unwrap();
        assert_eq!(summary.level, LogLevel::Error);
        assert!(summary.message.contains("code 3"));
    }

    #[test]
    fn test_stderr_is_captured() {
        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor
            .start("e3", sh("echo oops failure >&2"), Vec::new())
            .unwrap();

        let logs = drain_until_terminal(&supervisor, "e3");
        assert!(logs.iter().any(|l| l.message.contains("oops")));
    }

    #[test]
    fn test_completed_results_only_include_existing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let produced = dir.path().join("out.json");
        let missing = dir.path().join("never.json");

        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor
            .start(
                "e4",
                sh(&format!("echo '{{}}' > {}", produced.display())),
                vec![produced.clone(), missing],
            )
            .unwrap();

        drain_until_terminal(&supervisor, "e4");
        let results = supervisor.execution("e4").unwrap().results.unwrap();
        assert_eq!(results.output_files, vec![produced]);
    }

    #[test]
    fn test_cancel_unknown_execution_returns_false() {
        let supervisor = ExecutionSupervisor::new();
        assert!(!supervisor.cancel("nope"));
    }

    #[test]
    fn test_cancel_completed_execution_is_noop() {
        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor.start("e5", sh("true"), Vec::new()).unwrap();
        drain_until_terminal(&supervisor, "e5");

        assert!(!supervisor.cancel("e5"));
        // Terminal status and logs are unchanged
        assert_eq!(
            supervisor.execution("e5").unwrap().status,
            ExecutionStatus::Completed
        );
    }

    #[test]
    fn test_cancel_running_execution() {
        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor.start("e6", sh("sleep 30"), Vec::new()).unwrap();

        // Give the worker time to reach Running
        for _ in 0..100 {
            if supervisor.execution("e6").unwrap().status == ExecutionStatus::Running {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        assert!(supervisor.cancel("e6"));
        assert_eq!(
            supervisor.execution("e6").unwrap().status,
            ExecutionStatus::Cancelled
        );

        let logs = drain_until_terminal(&supervisor, "e6");
        assert!(logs.iter().any(|l| l.status == ExecutionStatus::Cancelled));
    }

    #[test]
    fn test_cancel_during_startup_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done.marker");

        let supervisor = Arc::new(ExecutionSupervisor::new());
        supervisor
            .start(
                "e7",
                sh(&format!("sleep 1; echo done > {}", marker.display())),
                Vec::new(),
            )
            .unwrap();

        // Cancel immediately, likely before the worker registers the handle
        assert!(supervisor.cancel("e7"));

        std::thread::sleep(Duration::from_millis(1800));
        assert_eq!(
            supervisor.execution("e7").unwrap().status,
            ExecutionStatus::Cancelled
        );
        // The process was killed before it could finish its work
        assert!(!marker.exists());
    }
}
