//! Pipeline Launching
//!
//! Forks one child per process with stdin/stdout wired across pipes,
//! applies redirections and environment assignments in the child, and
//! execs the resolved command. The parent collects exit statuses with a
//! blocking wait loop and, for interactive shells, moves the terminal
//! foreground to the job and back.

use std::ffi::CString;
use std::io;

use thiserror::Error;

use crate::ast::types::{Pipeline, Process, Redirection, RedirSource, RedirType};
use crate::editor::term;
use crate::exec::job::{Job, LaunchedProcess, ProcessStatus};
use crate::shell::ShellContext;

#[derive(Debug, Error)]
pub enum LaunchError {
    /// A syscall failed in the parent; the current job is abandoned.
    #[error("{operation}: {source}")]
    Sys { operation: &'static str, source: io::Error },
    /// A pipeline process had env assignments or redirections but no argv.
    #[error("missing command name")]
    MissingCommand,
    /// `wait` reported something other than exit or termination.
    #[error("wait: unexpected status for pid {0}")]
    UnexpectedStatus(libc::pid_t),
}

impl LaunchError {
    fn sys(operation: &'static str) -> Self {
        Self::Sys { operation, source: io::Error::last_os_error() }
    }
}

/// Launch a pipeline, wait for every child, and restore the terminal.
pub fn run_pipeline(ctx: &ShellContext, pipeline: &Pipeline) -> Result<Job, LaunchError> {
    let mut job = launch_pipeline(ctx, pipeline)?;
    let waited = wait_job(&mut job);
    let reclaimed = reclaim_terminal(ctx);
    waited?;
    reclaimed?;

    // The kernel already echoed `^C`; finish the line it left behind.
    if ctx.interactive {
        if let Some(status) = job.last_status() {
            if status.return_signal() == Some(libc::SIGINT) {
                let _ = term::write_all(b"\n");
            }
        }
    }
    Ok(job)
}

/// Fork and wire every process of the pipeline.
fn launch_pipeline(ctx: &ShellContext, pipeline: &Pipeline) -> Result<Job, LaunchError> {
    // Reject argv-less processes before any fork.
    if pipeline.processes.iter().any(|p| p.argv.is_empty()) {
        return Err(LaunchError::MissingCommand);
    }

    // Interactive jobs get a fresh group seeded by the first child's
    // pid; non-interactive children just stay in the shell's group.
    let mut job = Job::new(if ctx.interactive { 0 } else { ctx.pgid });
    let count = pipeline.len();
    let mut in_fd = libc::STDIN_FILENO;

    for (i, process) in pipeline.processes.iter().enumerate() {
        let (out_fd, next_in) = if i < count - 1 {
            match make_pipe() {
                Ok((read_end, write_end)) => (write_end, Some(read_end)),
                Err(err) => {
                    close_nonstd(in_fd);
                    reap_partial(&mut job);
                    return Err(err);
                }
            }
        } else {
            (libc::STDOUT_FILENO, None)
        };

        let pid = unsafe { libc::fork() };
        if pid < 0 {
            let err = LaunchError::sys("fork");
            close_nonstd(in_fd);
            close_nonstd(out_fd);
            if let Some(fd) = next_in {
                close_nonstd(fd);
            }
            reap_partial(&mut job);
            return Err(err);
        }

        if pid == 0 {
            child_exec(ctx, process, in_fd, out_fd, job.pgid, next_in);
        }

        // Parent side of the setpgid race: the child makes the same
        // call before exec, whichever lands first wins.
        if ctx.interactive {
            if job.pgid == 0 {
                job.pgid = pid;
            }
            unsafe { libc::setpgid(pid, job.pgid) };
        }
        log::debug!("launched pid {} in group {}", pid, job.pgid);
        job.processes.push(LaunchedProcess { pid, status: ProcessStatus::Running });

        close_nonstd(in_fd);
        close_nonstd(out_fd);
        in_fd = next_in.unwrap_or(libc::STDIN_FILENO);
    }

    Ok(job)
}

/// Reap the children of a partially launched job after a parent-side
/// failure, so they do not linger as zombies.
fn reap_partial(job: &mut Job) {
    if !job.processes.is_empty() {
        let _ = wait_job(job);
    }
}

fn make_pipe() -> Result<(i32, i32), LaunchError> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(LaunchError::sys("pipe"));
    }
    Ok((fds[0], fds[1]))
}

fn close_nonstd(fd: i32) {
    if fd != libc::STDIN_FILENO && fd != libc::STDOUT_FILENO {
        unsafe { libc::close(fd) };
    }
}

// =============================================================================
// Child setup (between fork and exec)
// =============================================================================

/// Never returns: ends in `execv` or `_exit(1)`.
fn child_exec(
    ctx: &ShellContext,
    process: &Process,
    in_fd: i32,
    out_fd: i32,
    pgid: libc::pid_t,
    leftover_read_end: Option<i32>,
) -> ! {
    // The read end of the pipe to the next stage belongs to the parent.
    if let Some(fd) = leftover_read_end {
        unsafe { libc::close(fd) };
    }

    if ctx.interactive {
        let pgid = if pgid == 0 { unsafe { libc::getpid() } } else { pgid };
        unsafe { libc::setpgid(0, pgid) };
        if in_fd == libc::STDIN_FILENO {
            // Must happen while SIGTTOU is still ignored, or the write
            // to the terminal's pgrp would stop this child.
            unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, pgid) };
        }
    }

    for signal in [
        libc::SIGINT,
        libc::SIGQUIT,
        libc::SIGTSTP,
        libc::SIGTTIN,
        libc::SIGTTOU,
        libc::SIGCHLD,
    ] {
        unsafe { libc::signal(signal, libc::SIG_DFL) };
    }

    if in_fd != libc::STDIN_FILENO {
        if unsafe { libc::dup2(in_fd, libc::STDIN_FILENO) } < 0 {
            child_die(ctx, "dup2");
        }
        unsafe { libc::close(in_fd) };
    }
    if out_fd != libc::STDOUT_FILENO {
        if unsafe { libc::dup2(out_fd, libc::STDOUT_FILENO) } < 0 {
            child_die(ctx, "dup2");
        }
        unsafe { libc::close(out_fd) };
    }

    for redirection in &process.redirections {
        if let Err(operation) = apply_redirection(redirection) {
            child_die(ctx, operation);
        }
    }

    for assignment in &process.assignments {
        match CString::new(assignment.as_str()) {
            // putenv keeps the pointer; the string must stay alive
            // until exec replaces the image.
            Ok(entry) => unsafe {
                libc::putenv(entry.into_raw());
            },
            Err(_) => child_die(ctx, "putenv"),
        }
    }

    let argv0 = &process.argv[0];
    let path = match resolve_command(argv0) {
        Some(path) => path,
        None => {
            eprintln!("{}: {}: command not found", ctx.name, argv0);
            unsafe { libc::_exit(1) }
        }
    };

    let mut args = Vec::with_capacity(process.argv.len());
    for arg in &process.argv {
        match CString::new(arg.as_str()) {
            Ok(arg) => args.push(arg),
            Err(_) => child_die(ctx, "execv"),
        }
    }
    let mut arg_ptrs: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
    arg_ptrs.push(std::ptr::null());

    unsafe { libc::execv(path.as_ptr(), arg_ptrs.as_ptr()) };
    child_die(ctx, "execv")
}

fn child_die(ctx: &ShellContext, operation: &str) -> ! {
    eprintln!("{}: {}: {}", ctx.name, operation, io::Error::last_os_error());
    unsafe { libc::_exit(1) }
}

/// Open or select the source fd and force it onto the target fd.
/// Returns the failing operation name on error.
fn apply_redirection(redirection: &Redirection) -> Result<(), &'static str> {
    let source_fd = match &redirection.source {
        RedirSource::Fd(fd) => *fd,
        RedirSource::Path(path) => {
            let c_path = CString::new(path.as_str()).map_err(|_| "open")?;
            let flags = match redirection.rtype {
                RedirType::PathIn => libc::O_RDONLY,
                RedirType::PathTrunc => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                RedirType::PathAppend => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
                RedirType::PathInOut => libc::O_RDWR | libc::O_CREAT,
                RedirType::FdIn | RedirType::FdOut => return Err("open"),
            };
            let fd = unsafe { libc::open(c_path.as_ptr(), flags, 0o666 as libc::c_uint) };
            if fd < 0 {
                return Err("open");
            }
            fd
        }
    };

    if source_fd != redirection.fd {
        unsafe { libc::close(redirection.fd) };
        // F_DUPFD with the target as the floor: the target fd was just
        // closed, so the result must land exactly there.
        let duped = unsafe { libc::fcntl(source_fd, libc::F_DUPFD, redirection.fd) };
        if duped < 0 || duped != redirection.fd {
            return Err("fcntl");
        }
        if !redirection.rtype.takes_fd() {
            unsafe { libc::close(source_fd) };
        }
    }
    Ok(())
}

/// Resolve argv[0]: verbatim when it contains a slash, else the first
/// executable match along `$PATH`.
fn resolve_command(name: &str) -> Option<CString> {
    if name.contains('/') {
        return CString::new(name).ok();
    }
    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in path_var.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = CString::new(format!("{}/{}", dir, name)).ok()?;
        if unsafe { libc::access(candidate.as_ptr(), libc::X_OK) } == 0 {
            return Some(candidate);
        }
    }
    None
}

// =============================================================================
// Waiting
// =============================================================================

/// Block until every process of the job is reaped, recording statuses.
fn wait_job(job: &mut Job) -> Result<(), LaunchError> {
    let mut remaining = job.running_count();
    while remaining > 0 {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe { libc::wait(&mut raw_status) };
        if pid < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(LaunchError::Sys { operation: "wait", source: err });
        }

        let launched = job
            .processes
            .iter_mut()
            .find(|p| p.pid == pid && p.status.is_running());
        let launched = match launched {
            Some(launched) => launched,
            // A child from some other job; not ours to record.
            None => continue,
        };

        if libc::WIFEXITED(raw_status) {
            launched.status = ProcessStatus::Exited(libc::WEXITSTATUS(raw_status));
        } else if libc::WIFSIGNALED(raw_status) {
            launched.status = ProcessStatus::Signaled(libc::WTERMSIG(raw_status));
        } else {
            return Err(LaunchError::UnexpectedStatus(pid));
        }
        log::debug!("reaped pid {}: {:?}", pid, launched.status);
        remaining -= 1;
    }
    Ok(())
}

/// Take the terminal back and reset its attributes to the shell's
/// saved state.
fn reclaim_terminal(ctx: &ShellContext) -> Result<(), LaunchError> {
    if !ctx.interactive {
        return Ok(());
    }
    if unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, ctx.pgid) } != 0 {
        return Err(LaunchError::sys("tcsetpgrp"));
    }
    if let Some(saved) = &ctx.saved_termios {
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, saved) } != 0 {
            return Err(LaunchError::sys("tcsetattr"));
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
