//! Inline retrieval directives emitted by an upstream language model.
//!
//! ```text
//! [[vector: how do I rotate api keys]]
//! [[keyword: "connection refused" postgres]]
//! [[episodes: onboarding questions]]
//! [[recall: 7d]]                      (also 12h, 30m)
//! [[recall: 2026-01-01T00:00:00Z..2026-01-31T23:59:59Z]]
//! ```
//!
//! Each directive maps to exactly one retrieval call. Malformed markers are
//! reported and skipped; the rest still run.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use engram_core::errors::RetrievalError;

static MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[([^\[\]]*)\]\]").unwrap());

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,6})\s*([dhm])$").unwrap());

/// Time window of a recall directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallWindow {
    /// The trailing duration up to the moment of the call.
    Last(Duration),
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl RecallWindow {
    /// Concrete `[start, end]` bounds relative to `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            Self::Last(span) => (now - span, now),
            Self::Between { start, end } => (start, end),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if let Some((start, end)) = raw.split_once("..") {
            let start = parse_instant(start)?;
            let end = parse_instant(end)?;
            if start > end {
                return Err(format!("window starts after it ends: {raw}"));
            }
            return Ok(Self::Between { start, end });
        }
        let caps = RELATIVE
            .captures(raw)
            .ok_or_else(|| format!("expected Nd, Nh, Nm or START..END, got `{raw}`"))?;
        let amount: i64 = caps[1]
            .parse()
            .map_err(|e| format!("bad amount `{}`: {e}", &caps[1]))?;
        let span = match &caps[2] {
            "d" => Duration::days(amount),
            "h" => Duration::hours(amount),
            _ => Duration::minutes(amount),
        };
        Ok(Self::Last(span))
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp `{}`: {e}", raw.trim()))
}

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Vector(String),
    Keyword(String),
    Episodes(String),
    Recall(RecallWindow),
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Keyword(_) => "keyword",
            Self::Episodes(_) => "episodes",
            Self::Recall(_) => "recall",
        }
    }
}

/// A marker that could not be turned into a directive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed directive `{marker}`: {reason}")]
pub struct DirectiveError {
    pub marker: String,
    pub reason: String,
}

impl From<DirectiveError> for RetrievalError {
    fn from(e: DirectiveError) -> Self {
        RetrievalError::MalformedDirective {
            directive: e.marker,
            reason: e.reason,
        }
    }
}

/// Directives found in a text, in order of appearance, plus the markers
/// that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDirectives {
    pub directives: Vec<Directive>,
    pub errors: Vec<DirectiveError>,
}

pub fn parse_directives(text: &str) -> ParsedDirectives {
    let mut parsed = ParsedDirectives::default();
    for caps in MARKER.captures_iter(text) {
        let marker = caps[0].to_string();
        match parse_marker(&caps[1]) {
            Ok(directive) => parsed.directives.push(directive),
            Err(reason) => {
                tracing::debug!(%marker, %reason, "skipping malformed directive");
                parsed.errors.push(DirectiveError { marker, reason });
            }
        }
    }
    parsed
}

fn parse_marker(inner: &str) -> Result<Directive, String> {
    let (name, arg) = inner
        .split_once(':')
        .ok_or_else(|| "expected `name: argument`".to_string())?;
    let arg = arg.trim();
    if arg.is_empty() {
        return Err("empty argument".into());
    }
    match name.trim().to_ascii_lowercase().as_str() {
        "vector" => Ok(Directive::Vector(arg.to_string())),
        "keyword" => Ok(Directive::Keyword(arg.to_string())),
        "episodes" | "episode" => Ok(Directive::Episodes(arg.to_string())),
        "recall" => RecallWindow::parse(arg).map(Directive::Recall),
        other => Err(format!("unknown directive `{other}`")),
    }
}
