//! SMS listing decode.
//!
//! Interprets the response to `AT+CSCA?;+CMGL="ALL"` in text mode. Each
//! `+CMGL:` header is followed by one or more body lines; senders and bodies
//! may be UCS-2 hex depending on the character set and are run through the
//! encoding detector.

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::TelemetryError;
use crate::telemetry::classifier;
use crate::telemetry::encoding::{self, TextEncoding};

/// Length of `yy/MM/dd,hh:mm:ss`.
const STAMP_LEN: usize = 17;

/// One stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsMessage {
    pub index: u32,
    /// `REC UNREAD`, `REC READ`, `STO SENT`, ...
    pub status: String,
    pub sender: String,
    /// RFC 3339 with the modem's reported offset.
    pub date: String,
    pub text: String,
    pub encoding: TextEncoding,
}

/// Messages plus the service centre number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmsInbox {
    pub service_center: Option<String>,
    /// Sorted by storage index.
    pub messages: Vec<SmsMessage>,
}

/// Parse an SMS listing with default settings.
pub fn parse_messages(blob: &str) -> Result<SmsInbox, TelemetryError> {
    parse_messages_with(blob, &ParserConfig::default())
}

/// Parse an SMS listing.
///
/// Records with an unparsable index or date are skipped and logged. Inside a
/// message body every line is text, including ones that read `OK`, `ERROR` or
/// `AT...`. Such a line only closes the listing when it is the last line or
/// the next line is a command echo.
///
/// # Errors
///
/// [`TelemetryError::ModemError`] if the modem's error token appears outside
/// a message body.
pub fn parse_messages_with(blob: &str, config: &ParserConfig) -> Result<SmsInbox, TelemetryError> {
    let lines = classifier::split_lines(blob);
    let prefix = config.echo_prefix.as_str();

    let mut inbox = SmsInbox::default();
    let mut current: Option<PendingMessage> = None;
    // Still true after a skipped header so its body is not read as status lines
    let mut in_body = false;

    for (i, text) in lines.iter().enumerate() {
        let is_header = text.starts_with("+CMGL:");
        if in_body && !is_header && !closes_listing(&lines[i..], prefix) {
            if let Some(pending) = current.as_mut() {
                pending.body.push(text.clone());
            }
            continue;
        }

        if is_header {
            if let Some(done) = current.take() {
                inbox.messages.push(done.finish());
            }
            current = parse_header(text);
            in_body = true;
        } else if classifier::is_error_token(text) {
            warn!("SMS: modem error token: {text}");
            return Err(TelemetryError::ModemError(text.clone()));
        } else if classifier::is_ack(text) || classifier::is_echo(text, prefix) {
            if let Some(done) = current.take() {
                inbox.messages.push(done.finish());
            }
            in_body = false;
        } else if let Some(data) = text.strip_prefix("+CSCA:") {
            inbox.service_center = parse_service_center(data);
        } else {
            debug!("SMS: stray line outside a message: {text}");
        }
    }
    if let Some(done) = current.take() {
        inbox.messages.push(done.finish());
    }

    inbox.messages.sort_by_key(|m| m.index);
    debug!("SMS: {} messages", inbox.messages.len());
    Ok(inbox)
}

/// An ack or error token ends the listing only as the final line or right
/// before the next command's echo.
fn closes_listing(rest: &[String], echo_prefix: &str) -> bool {
    let Some(first) = rest.first() else {
        return false;
    };
    if !classifier::is_ack(first) && !classifier::is_error_token(first) {
        return false;
    }
    rest.get(1)
        .is_none_or(|next| classifier::is_echo(next, echo_prefix))
}

struct PendingMessage {
    index: u32,
    status: String,
    sender: String,
    date: String,
    body: Vec<String>,
}

impl PendingMessage {
    fn finish(self) -> SmsMessage {
        let decoded = encoding::decode(&self.body.join("\n"));
        SmsMessage {
            index: self.index,
            status: self.status,
            sender: self.sender,
            date: self.date,
            text: decoded.decoded,
            encoding: decoded.encoding,
        }
    }
}

/// Parse `+CMGL: <idx>,"<stat>","<sender>",[<alpha>],"<date>"`.
fn parse_header(line: &str) -> Option<PendingMessage> {
    let (_, payload) = line.split_once(':')?;
    let fields = split_quoted(payload.trim());

    let Some(index) = fields.first().and_then(|v| v.parse::<u32>().ok()) else {
        warn!("SMS: skipping record with bad index: {line}");
        return None;
    };
    let status = fields.get(1).cloned().unwrap_or_default();
    let sender = fields
        .get(2)
        .map(|s| encoding::decode_number(s).decoded)
        .unwrap_or_default();

    // alpha is optional, so the date is the first later field that looks like one
    let raw_date = fields.iter().skip(3).find(|f| f.contains('/'));
    let Some(date) = raw_date.and_then(|d| parse_timestamp(d)) else {
        warn!(
            "SMS: skipping message {index}: invalid date {:?}",
            raw_date.map_or("", String::as_str)
        );
        return None;
    };

    Some(PendingMessage {
        index,
        status,
        sender,
        date,
        body: Vec::new(),
    })
}

/// `+CSCA: "<number>",<type>` → decoded number.
fn parse_service_center(data: &str) -> Option<String> {
    let fields = split_quoted(data);
    let number = fields.first().filter(|n| !n.is_empty())?;
    Some(encoding::decode_number(number).decoded)
}

/// Parse `yy/MM/dd,hh:mm:ss±qq` (offset in quarter hours) into RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"');
    let stamp = raw.get(..STAMP_LEN)?;
    let zone = raw.get(STAMP_LEN..)?;

    let naive = NaiveDateTime::parse_from_str(stamp, "%y/%m/%d,%H:%M:%S").ok()?;
    let quarters: i32 = if zone.is_empty() { 0 } else { zone.parse().ok()? };
    if !(-48..=56).contains(&quarters) {
        return None;
    }
    let offset = FixedOffset::east_opt(quarters * 15 * 60)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.to_rfc3339())
}

/// Split on commas outside double quotes, stripping the quotes.
fn split_quoted(data: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    for c in data.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
