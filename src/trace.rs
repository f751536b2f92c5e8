//! Structured trace events emitted by the mapping and reconciliation passes.
//!
//! The core functions never log on their own. Callers that want visibility
//! hand in a [`TraceSink`]: a closure, [`LogSink`] to forward to the `log`
//! facade, or [`NoTrace`] to discard everything.

use std::fmt;

use log::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent<'a> {
    HeadersFound {
        headers: Vec<&'a str>,
    },
    HeaderMapped {
        header: &'a str,
        field: &'a str,
        score: f64,
    },
    HeaderUnmatched {
        header: &'a str,
        best_score: f64,
    },
    /// The header's best field was already claimed by an earlier column.
    HeaderShadowed {
        header: &'a str,
        field: &'a str,
        claimed_by: &'a str,
    },
    ExistingKey {
        index: usize,
        key: &'a str,
    },
    DuplicateKey {
        index: usize,
        key: &'a str,
    },
    KeyRenamed {
        index: usize,
        from: &'a str,
        to: &'a str,
    },
}

impl TraceEvent<'_> {
    fn is_warning(&self) -> bool {
        matches!(
            self,
            TraceEvent::HeaderShadowed { .. }
                | TraceEvent::ExistingKey { .. }
                | TraceEvent::DuplicateKey { .. }
        )
    }
}

impl fmt::Display for TraceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::HeadersFound { headers } => {
                write!(f, "Sheet headers found: {headers:?}")
            }
            TraceEvent::HeaderMapped {
                header,
                field,
                score,
            } => write!(f, "Mapped '{header}' -> '{field}' (score {score:.2})"),
            TraceEvent::HeaderUnmatched { header, best_score } => {
                write!(f, "No match for '{header}' (best score {best_score:.2})")
            }
            TraceEvent::HeaderShadowed {
                header,
                field,
                claimed_by,
            } => write!(
                f,
                "'{header}' best matches '{field}' which is already mapped from '{claimed_by}'"
            ),
            TraceEvent::ExistingKey { index, key } => {
                write!(f, "Row {index}: key '{key}' already exists")
            }
            TraceEvent::DuplicateKey { index, key } => {
                write!(f, "Row {index}: key '{key}' repeats an earlier row")
            }
            TraceEvent::KeyRenamed { index, from, to } => {
                write!(f, "Row {index}: renamed key '{from}' -> '{to}'")
            }
        }
    }
}

pub trait TraceSink {
    fn trace(&mut self, event: &TraceEvent<'_>);
}

impl<F> TraceSink for F
where
    F: FnMut(&TraceEvent<'_>),
{
    fn trace(&mut self, event: &TraceEvent<'_>) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn trace(&mut self, _event: &TraceEvent<'_>) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        if event.is_warning() {
            warn!("{event}");
        } else {
            debug!("{event}");
        }
    }
}
