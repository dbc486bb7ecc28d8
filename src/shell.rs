//! Shell Environment
//!
//! Main entry point for the shell. Ties together the line editor, the
//! parser, and the job launcher, and owns the per-run context (program
//! name, interactivity, process group, saved terminal attributes).

use std::io;

use crate::editor::{term, LineEditor, ReadOutcome};
use crate::exec::{self, LaunchError};
use crate::parser;

/// Immutable-after-startup facts about this shell process.
pub struct ShellContext {
    /// Program name used as the diagnostic prefix
    pub name: String,
    pub interactive: bool,
    /// The shell's process group; -1 for non-interactive runs
    pub pgid: libc::pid_t,
    /// Terminal attributes captured at startup, when interactive
    pub saved_termios: Option<libc::termios>,
}

impl ShellContext {
    pub fn non_interactive(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interactive: false,
            pgid: -1,
            saved_termios: None,
        }
    }

    pub fn interactive(name: &str) -> io::Result<Self> {
        let saved = term::save_attrs()?;
        Ok(Self {
            name: name.to_string(),
            interactive: true,
            pgid: unsafe { libc::getpgrp() },
            saved_termios: Some(saved),
        })
    }
}

/// Whether one input left the shell able to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputResult {
    /// Executed, failed recoverably, or was empty
    Done,
    /// Syscall-level failure; the session should end with status 1
    Fatal,
}

/// The main shell environment.
pub struct Shell {
    context: ShellContext,
    editor: LineEditor,
}

impl Shell {
    pub fn new(context: ShellContext) -> Self {
        Self {
            context,
            editor: LineEditor::new(),
        }
    }

    pub fn context(&self) -> &ShellContext {
        &self.context
    }

    /// Read-eval loop against the terminal. Returns the process exit
    /// code: 0 on end-of-input, 1 on a fatal error.
    pub fn run_interactive(&mut self) -> i32 {
        if let Err(err) = install_interactive_signals() {
            eprintln!("{}: sigaction: {}", self.context.name, err);
            return 1;
        }
        let saved = match self.context.saved_termios {
            Some(saved) => saved,
            None => return 1,
        };
        log::debug!("interactive session started");

        loop {
            match self.editor.read_line(&saved) {
                ReadOutcome::Line(line) => {
                    if self.run_input(&line) == InputResult::Fatal {
                        return 1;
                    }
                }
                ReadOutcome::Exit => {
                    log::debug!("interactive session ended");
                    return 0;
                }
                ReadOutcome::Interrupt => return 1,
            }
        }
    }

    /// Execute one complete input (a `-c` string or all of stdin).
    /// A failing user command is reported but still exits 0; only
    /// syscall-level failures produce 1.
    pub fn run_non_interactive(&mut self, input: &str) -> i32 {
        match self.run_input(input) {
            InputResult::Done => 0,
            InputResult::Fatal => 1,
        }
    }

    /// Parse and launch one input. Recoverable problems (syntax errors,
    /// failing commands, missing command names) are reported to stderr
    /// and the shell carries on.
    fn run_input(&mut self, input: &str) -> InputResult {
        if input.trim().is_empty() {
            return InputResult::Done;
        }

        let pipeline = match parser::parse(input) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                eprintln!("{}: {}", self.context.name, err);
                return InputResult::Done;
            }
        };

        match exec::run_pipeline(&self.context, &pipeline) {
            Ok(job) => {
                if let Some(status) = job.last_status() {
                    log::debug!("job {} finished: {:?}", job.pgid, status);
                }
                InputResult::Done
            }
            Err(err @ LaunchError::MissingCommand) => {
                eprintln!("{}: {}", self.context.name, err);
                InputResult::Done
            }
            Err(err) => {
                eprintln!("{}: {}", self.context.name, err);
                InputResult::Fatal
            }
        }
    }

    /// `-D`: echo the code of every raw input byte until ^D.
    pub fn run_debug_input(&self) -> i32 {
        let saved = match term::save_attrs() {
            Ok(saved) => saved,
            Err(err) => {
                eprintln!("{}: tcgetattr: {}", self.context.name, err);
                return 1;
            }
        };
        if let Err(err) = term::enter_raw(&saved) {
            eprintln!("{}: tcsetattr: {}", self.context.name, err);
            return 1;
        }

        let code = loop {
            match term::getch() {
                Ok(Some(0x04)) | Ok(None) => break 0,
                Ok(Some(byte)) => {
                    let mut line = format!("\\0x{:02x} {}", byte, byte);
                    if byte.is_ascii_graphic() || byte == b' ' {
                        line.push_str(&format!(" '{}'", byte as char));
                    }
                    println!("{}", line);
                }
                Err(err) => {
                    eprintln!("{}: read: {}", self.context.name, err);
                    break 1;
                }
            }
        };

        let _ = term::restore(&saved);
        code
    }
}

/// The interactive shell shrugs off job-control signals; children
/// restore the defaults before exec.
fn install_interactive_signals() -> io::Result<()> {
    for signal in [
        libc::SIGINT,
        libc::SIGQUIT,
        libc::SIGTSTP,
        libc::SIGTTIN,
        libc::SIGTTOU,
    ] {
        if unsafe { libc::signal(signal, libc::SIG_IGN) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    // SIGCHLD stays default so `wait` can reap children.
    if unsafe { libc::signal(libc::SIGCHLD, libc::SIG_DFL) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_interactive_context() {
        let context = ShellContext::non_interactive("minsh");
        assert_eq!(context.name, "minsh");
        assert!(!context.interactive);
        assert_eq!(context.pgid, -1);
        assert!(context.saved_termios.is_none());
    }

    #[test]
    fn test_empty_input_is_done() {
        let mut shell = Shell::new(ShellContext::non_interactive("minsh"));
        assert_eq!(shell.run_input(""), InputResult::Done);
        assert_eq!(shell.run_input("   \n\t"), InputResult::Done);
    }

    #[test]
    fn test_syntax_error_is_recoverable() {
        let mut shell = Shell::new(ShellContext::non_interactive("minsh"));
        assert_eq!(shell.run_input("a ; b"), InputResult::Done);
        assert_eq!(shell.run_non_interactive("'open quote"), 0);
    }

    #[test]
    fn test_assignment_only_is_recoverable() {
        let mut shell = Shell::new(ShellContext::non_interactive("minsh"));
        assert_eq!(shell.run_input("FOO=bar"), InputResult::Done);
    }
}
