//! Abstract Syntax Tree (AST) Types for Pipelines
//!
//! The parser reduces one input line to a `Pipeline`: an ordered,
//! non-empty list of `Process` descriptors. Each descriptor carries the
//! leading environment assignments, the argument vector, and the
//! redirections in the order they were written.

use std::fmt;

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// Redirection operator, as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirType {
    /// `<`: open path read-only on the target fd
    PathIn,
    /// `>`: open path write-only, create + truncate
    PathTrunc,
    /// `>>`: open path write-only, create + append
    PathAppend,
    /// `<>`: open path read-write, create, no truncation
    PathInOut,
    /// `<&`: duplicate an existing fd for input
    FdIn,
    /// `>&`: duplicate an existing fd for output
    FdOut,
}

impl RedirType {
    /// The target fd this operator acts on when none is written.
    pub fn default_fd(self) -> i32 {
        match self {
            Self::PathIn | Self::PathInOut | Self::FdIn => libc::STDIN_FILENO,
            Self::PathTrunc | Self::PathAppend | Self::FdOut => libc::STDOUT_FILENO,
        }
    }

    /// Whether the operator's source is an fd number rather than a path.
    pub fn takes_fd(self) -> bool {
        matches!(self, Self::FdIn | Self::FdOut)
    }
}

impl fmt::Display for RedirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathIn => write!(f, "<"),
            Self::PathTrunc => write!(f, ">"),
            Self::PathAppend => write!(f, ">>"),
            Self::PathInOut => write!(f, "<>"),
            Self::FdIn => write!(f, "<&"),
            Self::FdOut => write!(f, ">&"),
        }
    }
}

/// What a redirection reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirSource {
    Path(String),
    Fd(i32),
}

/// One redirection: `[fd]OP source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    /// The fd being redirected (0 for `<*`, 1 for `>*` unless written)
    pub fd: i32,
    pub rtype: RedirType,
    pub source: RedirSource,
}

impl Redirection {
    pub fn to_path(fd: i32, rtype: RedirType, path: impl Into<String>) -> Self {
        Self { fd, rtype, source: RedirSource::Path(path.into()) }
    }

    pub fn to_fd(fd: i32, rtype: RedirType, source_fd: i32) -> Self {
        Self { fd, rtype, source: RedirSource::Fd(source_fd) }
    }
}

// =============================================================================
// PROCESSES & PIPELINES
// =============================================================================

/// The parsed form of one command in a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Process {
    /// Leading `NAME=VALUE` words, in order
    pub assignments: Vec<String>,
    /// Command name and arguments; empty only for assignment-only input
    pub argv: Vec<String>,
    /// Redirections in the order written
    pub redirections: Vec<Redirection>,
}

impl Process {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no word of any kind was consumed into this process.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.argv.is_empty() && self.redirections.is_empty()
    }
}

/// An ordered, non-empty list of processes connected stdin-to-stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub processes: Vec<Process>,
}

impl Pipeline {
    pub fn new(processes: Vec<Process>) -> Self {
        Self { processes }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
