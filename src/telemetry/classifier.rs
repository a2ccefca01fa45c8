//! Line classification for batched AT responses.
//!
//! A batched request (`AT+CSQ;+QENG="servingcell";...`) comes back as one
//! undelimited stream. The classifier splits it into trimmed lines, drops
//! acknowledgements, and tags every line with the most recent command echo so
//! later stages can tell which sub-command a bare line belongs to.

use serde::Serialize;

/// Acknowledgement token emitted after a successful command.
const ACK_TOKEN: &str = "OK";

/// A single response line with the command echo it followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawLine {
    pub text: String,
    /// Most recent echo line seen before this one, if any.
    pub originating_command: Option<String>,
}

impl RawLine {
    /// True if this line starts with the given response prefix (e.g. `+QENG:`).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    /// Payload after the first `:` of a `+XXX: payload` line.
    pub fn payload(&self) -> Option<&str> {
        self.text.split_once(':').map(|(_, rest)| rest.trim())
    }
}

/// Split a raw response blob into classified lines.
///
/// Echo lines (those starting with `echo_prefix` once leading garbage is
/// skipped) are not emitted; they become the `originating_command` of every
/// following line until the next echo.
pub fn classify(blob: &str, echo_prefix: &str) -> Vec<RawLine> {
    let mut context: Option<String> = None;
    let mut lines = Vec::new();

    for text in split_lines(blob) {
        if is_ack(&text) {
            continue;
        }
        if let Some(echo) = echo_text(&text, echo_prefix) {
            context = Some(echo.to_string());
            continue;
        }
        lines.push(RawLine {
            text,
            originating_command: context.clone(),
        });
    }

    lines
}

/// Sanitized, trimmed, non-empty lines with nothing dropped or tagged.
///
/// For callers that must see acknowledgement and echo-shaped lines, such as
/// free-text SMS bodies.
pub fn split_lines(blob: &str) -> Vec<String> {
    sanitize_response(blob)
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// First line carrying the modem's error token, if any.
pub fn find_error_token(lines: &[RawLine]) -> Option<&str> {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .find(|t| is_error_token(t))
}

/// True for `ERROR`, `+CME ERROR: n` and `+CMS ERROR: n`.
pub fn is_error_token(line: &str) -> bool {
    line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR")
}

pub fn is_ack(line: &str) -> bool {
    line == ACK_TOKEN
}

/// True if `line` is a command echo under `echo_prefix`.
pub fn is_echo(line: &str, echo_prefix: &str) -> bool {
    echo_text(line, echo_prefix).is_some()
}

/// The cleaned response, echo and acknowledgement noise removed.
pub fn raw_echo(lines: &[RawLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove NUL bytes and non-printable control characters (except CR/LF).
/// Stale serial buffers can leave garbage bytes that break line splitting.
fn sanitize_response(response: &str) -> String {
    response
        .chars()
        .filter(|&c| c == '\r' || c == '\n' || !c.is_control())
        .filter(|&c| c != '\u{FFFD}')
        .collect()
}

/// If `line` is a command echo, return it without leading garbage.
fn echo_text<'a>(line: &'a str, echo_prefix: &str) -> Option<&'a str> {
    // Skip leading non-alpha chars before checking for the echo prefix
    let pos = line.find(|c: char| c.is_ascii_alphabetic())?;
    let candidate = &line[pos..];
    let head = candidate.get(..echo_prefix.len())?;
    if !head.eq_ignore_ascii_case(echo_prefix) {
        return None;
    }
    // "AT+CSQ" or a bare "AT", but not SMS text such as "At 6pm" or "Attic"
    match candidate[echo_prefix.len()..].chars().next() {
        None => Some(candidate),
        Some(c) if !c.is_alphanumeric() && !c.is_whitespace() => Some(candidate),
        Some(_) => None,
    }
}
