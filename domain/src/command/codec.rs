//! Wire codec for the BEGIN/END command protocol.
//!
//! A well-formed model reply contains exactly one block:
//!
//! ```text
//! BEGIN
//! QUERY(get_issue, {"id": "PROJ-1"})
//! END
//! ```
//!
//! Prose before `BEGIN` is tolerated (models like to narrate before the
//! block); anything after `END` is rejected. Inside the block there must be
//! exactly one command. Parsing is pure and total: every malformed input maps
//! to a [`ParseError`], never a fallthrough or a guess.

use super::entities::{Args, Command};

/// Opening marker line of a command block.
pub const BEGIN_MARKER: &str = "BEGIN";
/// Closing marker line of a command block.
pub const END_MARKER: &str = "END";

/// Why a model reply failed to parse as a command block.
///
/// The message text of each variant is fed back to the model verbatim when
/// the orchestration loop asks for a corrected reply, so it names the exact
/// rule that was broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no BEGIN marker line found")]
    MissingBegin,
    #[error("BEGIN marker without a matching END")]
    MissingEnd,
    #[error("unexpected content after END: {0:?}")]
    TrailingContent(String),
    #[error("command block is empty")]
    EmptyBlock,
    #[error("expected exactly one command per block, found extra content: {0:?}")]
    ExtraCommand(String),
    #[error("malformed command {line:?}: {reason}")]
    MalformedCommand { line: String, reason: String },
    #[error("unknown command {name:?} (the protocol defines QUERY, TASK and ERROR)")]
    UnknownCommand { name: String },
    #[error("invalid arguments for {tool:?}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl ParseError {
    fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse one model reply into a [`Command`].
pub fn parse(raw: &str) -> Result<Command, ParseError> {
    let lines: Vec<&str> = raw.lines().collect();

    let begin = lines
        .iter()
        .position(|l| l.trim() == BEGIN_MARKER)
        .ok_or(ParseError::MissingBegin)?;
    let end = lines[begin + 1..]
        .iter()
        .position(|l| l.trim() == END_MARKER)
        .map(|i| begin + 1 + i)
        .ok_or(ParseError::MissingEnd)?;

    if let Some(extra) = lines[end + 1..].iter().find(|l| !l.trim().is_empty()) {
        return Err(ParseError::TrailingContent(extra.trim().to_string()));
    }

    let body = lines[begin + 1..end].join("\n");
    let body = body.trim();
    if body.is_empty() {
        return Err(ParseError::EmptyBlock);
    }

    parse_command_text(body)
}

fn parse_command_text(body: &str) -> Result<Command, ParseError> {
    let open = body
        .find('(')
        .ok_or_else(|| ParseError::malformed(body, "expected KEYWORD(...)"))?;
    let keyword = &body[..open];
    if keyword.is_empty() || !keyword.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::malformed(body, "expected KEYWORD(...)"));
    }

    let close = matching_paren(body, open)
        .ok_or_else(|| ParseError::malformed(body, "unbalanced parentheses"))?;
    let rest = body[close + 1..].trim();
    if !rest.is_empty() {
        return Err(ParseError::ExtraCommand(rest.to_string()));
    }

    let inner = &body[open + 1..close];
    match keyword {
        "QUERY" => {
            let (tool, args) = parse_invocation(body, inner)?;
            Ok(Command::Query { tool, args })
        }
        "TASK" => {
            let (tool, args) = parse_invocation(body, inner)?;
            Ok(Command::Task { tool, args })
        }
        "ERROR" => Ok(Command::Error {
            message: parse_error_message(body, inner)?,
        }),
        other => Err(ParseError::UnknownCommand {
            name: other.to_string(),
        }),
    }
}

/// Find the `)` matching the `(` at byte offset `open`, skipping parentheses
/// inside JSON string literals.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `tool_name` or `tool_name, {json object}`.
fn parse_invocation(line: &str, inner: &str) -> Result<(String, Args), ParseError> {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(inner.len());
    let tool = &inner[..name_end];
    if tool.is_empty() {
        return Err(ParseError::malformed(line, "missing tool name"));
    }

    let rest = inner[name_end..].trim_start();
    if rest.is_empty() {
        return Ok((tool.to_string(), Args::new()));
    }

    let Some(rest) = rest.strip_prefix(',') else {
        return Err(ParseError::malformed(
            line,
            "expected a comma between tool name and arguments",
        ));
    };
    let rest = rest.trim();
    let args: Args =
        serde_json::from_str(rest).map_err(|e| ParseError::InvalidArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        })?;
    Ok((tool.to_string(), args))
}

/// Parse the payload of `ERROR(...)`: a JSON string literal, or bare text.
fn parse_error_message(line: &str, inner: &str) -> Result<String, ParseError> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(ParseError::malformed(line, "empty error message"));
    }
    if inner.starts_with('"') {
        return serde_json::from_str::<String>(inner)
            .map_err(|e| ParseError::malformed(line, format!("bad error string: {e}")));
    }
    Ok(inner.to_string())
}

/// Render a command as its canonical wire block.
///
/// Deterministic: the same command always renders the same bytes, and
/// `parse(render(c)) == c` for every valid command.
pub fn render(command: &Command) -> String {
    let line = match command {
        Command::Query { tool, args } => {
            format!("QUERY({tool}, {})", serde_json::Value::Object(args.clone()))
        }
        Command::Task { tool, args } => {
            format!("TASK({tool}, {})", serde_json::Value::Object(args.clone()))
        }
        Command::Error { message } => {
            format!("ERROR({})", serde_json::Value::String(message.clone()))
        }
    };
    format!("{BEGIN_MARKER}\n{line}\n{END_MARKER}")
}
