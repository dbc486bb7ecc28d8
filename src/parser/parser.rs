//! Pipeline Parser
//!
//! Consumes the lexer's token stream and builds one `Pipeline`: a list
//! of `Process` descriptors separated by `|`. Within a process, leading
//! `NAME=VALUE` words become environment assignments, redirection
//! operators claim an optional adjacent fd number, and everything else
//! accumulates into argv.

use crate::ast::types::{Pipeline, Process, Redirection, RedirType};
use crate::parser::lexer::Lexer;
use crate::parser::types::{is_assignment_word, ParseError, Token};

/// Parse one input into a pipeline.
pub fn parse(input: &str) -> Result<Pipeline, ParseError> {
    let mut lexer = Lexer::new(input);
    parse_pipeline(&mut lexer)
}

/// Build processes until end of input, consuming a `|` between each.
pub fn parse_pipeline(lexer: &mut Lexer) -> Result<Pipeline, ParseError> {
    let mut processes = Vec::new();

    loop {
        let process = parse_process(lexer)?;
        let token = lexer.next_token()?;

        if token.is_end() {
            processes.push(process);
            return Ok(Pipeline::new(processes));
        }

        let text = token.text.as_deref().unwrap_or("");
        if token.meta && text == "|" {
            // A process with no command may only end a pipeline.
            if process.argv.is_empty() {
                return Err(ParseError::new("unexpected metacharacter `|'", lexer.line()));
            }
            processes.push(process);

            let next = lexer.next_token()?;
            if next.is_end() {
                return Err(ParseError::new(
                    "syntax error: unexpected end of file",
                    lexer.line(),
                ));
            }
            lexer.push_back(next);
            continue;
        }

        return Err(ParseError::new(
            format!("unexpected metacharacter `{}'", text),
            lexer.line(),
        ));
    }
}

/// Build one process. Stops at end of input or at a `|`, which is pushed
/// back for `parse_pipeline` to consume.
fn parse_process(lexer: &mut Lexer) -> Result<Process, ParseError> {
    let mut process = Process::new();
    let mut done_vars = false;
    // One word may be held back in case the next operator claims it as
    // its target fd (`2>err`). The PRE-META flag is stripped on buffering.
    let mut premeta: Option<String> = None;

    loop {
        let token = lexer.next_token()?;

        let text = match token.text {
            Some(ref t) => t.clone(),
            None => {
                if let Some(word) = premeta.take() {
                    push_word(&mut process, &mut done_vars, word);
                }
                return Ok(process);
            }
        };

        if token.meta {
            if text == "|" {
                if let Some(word) = premeta.take() {
                    push_word(&mut process, &mut done_vars, word);
                }
                lexer.push_back(Token::meta(text));
                return Ok(process);
            }

            if text.starts_with('<') || text.starts_with('>') {
                parse_redirection(lexer, &mut process, &mut done_vars, &mut premeta, &text)?;
                continue;
            }

            return Err(ParseError::new(
                format!("unexpected metacharacter `{}'", text),
                lexer.line(),
            ));
        }

        if token.premeta {
            if premeta.is_some() {
                // Two PRE-META words in a row cannot come out of the
                // lexer; an unwinding panic would exit 101, not 1.
                eprintln!("double PRE-META token `{}'", text);
                std::process::exit(1);
            }
            premeta = Some(text);
            continue;
        }

        if let Some(word) = premeta.take() {
            push_word(&mut process, &mut done_vars, word);
        }
        push_word(&mut process, &mut done_vars, text);
    }
}

/// Map an operator to a redirection, claiming the buffered PRE-META word
/// as the target fd when it is a bare number.
fn parse_redirection(
    lexer: &mut Lexer,
    process: &mut Process,
    done_vars: &mut bool,
    premeta: &mut Option<String>,
    op: &str,
) -> Result<(), ParseError> {
    let rtype = match op {
        "<" => RedirType::PathIn,
        ">" => RedirType::PathTrunc,
        ">>" => RedirType::PathAppend,
        "<>" => RedirType::PathInOut,
        "<&" => RedirType::FdIn,
        ">&" => RedirType::FdOut,
        _ => {
            return Err(ParseError::new(
                format!("unknown redirection op `{}'", op),
                lexer.line(),
            ))
        }
    };

    let mut fd = rtype.default_fd();
    if let Some(word) = premeta.take() {
        match parse_fd(&word) {
            Some(n) => fd = n,
            // Not a number after all; it was an ordinary word.
            None => push_word(process, done_vars, word),
        }
    }

    let target = lexer.next_token()?;
    let text = match target.text {
        Some(t) => t,
        None => {
            return Err(ParseError::new(
                "syntax error: unexpected end of file",
                lexer.line(),
            ))
        }
    };
    if target.meta {
        return Err(ParseError::new(
            format!("unexpected metacharacter `{}'", text),
            lexer.line(),
        ));
    }

    let redirection = if rtype.takes_fd() {
        let source_fd = parse_fd(&text).ok_or_else(|| {
            ParseError::new(format!("invalid redirection fd `{}'", text), lexer.line())
        })?;
        Redirection::to_fd(fd, rtype, source_fd)
    } else {
        Redirection::to_path(fd, rtype, text)
    };

    process.redirections.push(redirection);
    Ok(())
}

fn push_word(process: &mut Process, done_vars: &mut bool, word: String) {
    if !*done_vars && is_assignment_word(&word) {
        process.assignments.push(word);
    } else {
        *done_vars = true;
        process.argv.push(word);
    }
}

/// A non-negative integer with no trailing garbage.
fn parse_fd(s: &str) -> Option<i32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i32>().ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::RedirSource;
    use pretty_assertions::assert_eq;

    fn argv(process: &Process) -> Vec<&str> {
        process.argv.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_single_command() {
        let pipeline = parse("echo hello").unwrap();
        assert_eq!(pipeline.len(), 1);
        let p = &pipeline.processes[0];
        assert_eq!(argv(p), vec!["echo", "hello"]);
        assert!(p.assignments.is_empty());
        assert!(p.redirections.is_empty());
    }

    #[test]
    fn test_env_assignments_before_command() {
        let pipeline = parse("FOO=bar BAZ=qux cmd a b").unwrap();
        let p = &pipeline.processes[0];
        assert_eq!(p.assignments, vec!["FOO=bar", "BAZ=qux"]);
        assert_eq!(argv(p), vec!["cmd", "a", "b"]);
    }

    #[test]
    fn test_assignment_after_command_is_argv() {
        let pipeline = parse("cmd FOO=bar").unwrap();
        let p = &pipeline.processes[0];
        assert!(p.assignments.is_empty());
        assert_eq!(argv(p), vec!["cmd", "FOO=bar"]);
    }

    #[test]
    fn test_three_stage_pipeline() {
        let pipeline = parse("a|b|c").unwrap();
        assert_eq!(pipeline.len(), 3);
        assert_eq!(argv(&pipeline.processes[0]), vec!["a"]);
        assert_eq!(argv(&pipeline.processes[1]), vec!["b"]);
        assert_eq!(argv(&pipeline.processes[2]), vec!["c"]);
    }

    #[test]
    fn test_redirections_with_fd_capture() {
        let pipeline = parse("cmd 2>err.txt >&1").unwrap();
        let p = &pipeline.processes[0];
        assert_eq!(argv(p), vec!["cmd"]);
        assert_eq!(
            p.redirections,
            vec![
                Redirection {
                    fd: 2,
                    rtype: RedirType::PathTrunc,
                    source: RedirSource::Path("err.txt".to_string()),
                },
                Redirection { fd: 1, rtype: RedirType::FdOut, source: RedirSource::Fd(1) },
            ]
        );
    }

    #[test]
    fn test_non_numeric_premeta_is_a_word() {
        let pipeline = parse("cmd foo>out").unwrap();
        let p = &pipeline.processes[0];
        assert_eq!(argv(p), vec!["cmd", "foo"]);
        assert_eq!(
            p.redirections,
            vec![Redirection::to_path(1, RedirType::PathTrunc, "out")]
        );
    }

    #[test]
    fn test_input_redirection_default_fd() {
        let pipeline = parse("cat <in.txt").unwrap();
        assert_eq!(
            pipeline.processes[0].redirections,
            vec![Redirection::to_path(0, RedirType::PathIn, "in.txt")]
        );
    }

    #[test]
    fn test_inout_and_append() {
        let pipeline = parse("cmd <>rw.txt >>log.txt").unwrap();
        assert_eq!(
            pipeline.processes[0].redirections,
            vec![
                Redirection::to_path(0, RedirType::PathInOut, "rw.txt"),
                Redirection::to_path(1, RedirType::PathAppend, "log.txt"),
            ]
        );
    }

    #[test]
    fn test_quoted_word_single_argv_entry() {
        let pipeline = parse("\"hello world\"").unwrap();
        assert_eq!(argv(&pipeline.processes[0]), vec!["hello world"]);
    }

    #[test]
    fn test_quoted_pieces_concatenate() {
        let pipeline = parse("'it''s'").unwrap();
        assert_eq!(argv(&pipeline.processes[0]), vec!["its"]);
    }

    #[test]
    fn test_unterminated_quote_error() {
        let err = parse("'unterminated").unwrap_err();
        assert_eq!(err.message, "unexpected EOF while looking for matching quote");
    }

    #[test]
    fn test_trailing_pipe_error() {
        let err = parse("cmd |").unwrap_err();
        assert_eq!(err.message, "syntax error: unexpected end of file");
    }

    #[test]
    fn test_leading_pipe_error() {
        let err = parse("| cmd").unwrap_err();
        assert_eq!(err.message, "unexpected metacharacter `|'");
    }

    #[test]
    fn test_assignment_only_then_pipe_error() {
        let err = parse("FOO=bar | cmd").unwrap_err();
        assert_eq!(err.message, "unexpected metacharacter `|'");
    }

    #[test]
    fn test_unsupported_operator() {
        let err = parse("a && b").unwrap_err();
        assert_eq!(err.message, "unexpected metacharacter `&&'");
    }

    #[test]
    fn test_semicolon_rejected() {
        let err = parse("a; b").unwrap_err();
        assert_eq!(err.message, "unexpected metacharacter `;'");
    }

    #[test]
    fn test_heredoc_operator_unknown() {
        let err = parse("cmd <<EOF").unwrap_err();
        assert_eq!(err.message, "unknown redirection op `<<'");
    }

    #[test]
    fn test_redirection_without_target() {
        let err = parse("cmd >").unwrap_err();
        assert_eq!(err.message, "syntax error: unexpected end of file");
    }

    #[test]
    fn test_redirection_target_is_operator() {
        let err = parse("cmd > | b").unwrap_err();
        assert_eq!(err.message, "unexpected metacharacter `|'");
    }

    #[test]
    fn test_invalid_fd_source() {
        let err = parse("cmd >&abc").unwrap_err();
        assert_eq!(err.message, "invalid redirection fd `abc'");
    }

    #[test]
    fn test_error_line_number() {
        let err = parse("a\nb\nc ;").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_assignment_only_pipeline() {
        let pipeline = parse("FOO=bar").unwrap();
        let p = &pipeline.processes[0];
        assert_eq!(p.assignments, vec!["FOO=bar"]);
        assert!(p.argv.is_empty());
    }

    #[test]
    fn test_redirection_target_premeta() {
        let pipeline = parse("a >out|b").unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(
            pipeline.processes[0].redirections,
            vec![Redirection::to_path(1, RedirType::PathTrunc, "out")]
        );
        assert_eq!(argv(&pipeline.processes[1]), vec!["b"]);
    }
}
