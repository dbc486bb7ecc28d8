//! Job Bookkeeping
//!
//! A `Job` is one launched pipeline: the process group all children
//! joined and the per-process completion state the wait loop fills in.

/// Completion state of one launched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Not yet reaped
    Running,
    /// Normal termination with this exit code
    Exited(i32),
    /// Terminated by this signal
    Signaled(i32),
}

impl ProcessStatus {
    /// Shell-style return status: the exit code, or 128 + signal.
    pub fn return_status(&self) -> Option<i32> {
        match self {
            Self::Running => None,
            Self::Exited(code) => Some(*code),
            Self::Signaled(signal) => Some(128 + *signal),
        }
    }

    /// The terminating signal, when there was one.
    pub fn return_signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(signal) => Some(*signal),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// One forked child of a job.
#[derive(Debug, Clone, Copy)]
pub struct LaunchedProcess {
    pub pid: libc::pid_t,
    pub status: ProcessStatus,
}

/// A launched pipeline sharing a single process group.
#[derive(Debug)]
pub struct Job {
    /// Process group all children adopted. Carries the context's -1
    /// sentinel for non-interactive jobs, which stay in the shell's
    /// inherited group.
    pub pgid: libc::pid_t,
    /// Children in pipeline order
    pub processes: Vec<LaunchedProcess>,
}

impl Job {
    pub fn new(pgid: libc::pid_t) -> Self {
        Self { pgid, processes: Vec::new() }
    }

    /// Status of the pipeline's last process, which stands for the job.
    pub fn last_status(&self) -> Option<ProcessStatus> {
        self.processes.last().map(|p| p.status)
    }

    pub fn running_count(&self) -> usize {
        self.processes.iter().filter(|p| p.status.is_running()).count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_status_mapping() {
        assert_eq!(ProcessStatus::Exited(0).return_status(), Some(0));
        assert_eq!(ProcessStatus::Exited(3).return_status(), Some(3));
        assert_eq!(ProcessStatus::Signaled(2).return_status(), Some(130));
        assert_eq!(ProcessStatus::Running.return_status(), None);
    }

    #[test]
    fn test_return_signal() {
        assert_eq!(ProcessStatus::Signaled(9).return_signal(), Some(9));
        assert_eq!(ProcessStatus::Exited(0).return_signal(), None);
    }

    #[test]
    fn test_job_last_status() {
        let mut job = Job::new(100);
        assert_eq!(job.last_status(), None);
        job.processes.push(LaunchedProcess { pid: 1, status: ProcessStatus::Exited(0) });
        job.processes.push(LaunchedProcess { pid: 2, status: ProcessStatus::Running });
        assert_eq!(job.last_status(), Some(ProcessStatus::Running));
        assert_eq!(job.running_count(), 1);
    }
}
