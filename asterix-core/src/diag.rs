//! Decode diagnostics: recoverable problems reported while decoding continues.
//!
//! The decoder never logs directly. It hands every [`Diagnostic`] to the sink
//! injected through [`Decoder::with_sink`](crate::Decoder::with_sink).

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::warn;

use crate::types::{hex_encode, serialize_hex, AsterixError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    UnsupportedCategory,
    MalformedFspec,
    FieldRange,
    LengthMismatch,
    TruncatedBuffer,
    /// FSPEC bits set past the end of the UAP.
    IgnoredPresenceBits,
    /// Bytes after the declared length of a single-message chunk.
    TrailingBytes,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedCategory => "UnsupportedCategory",
            DiagnosticKind::MalformedFspec => "MalformedFspec",
            DiagnosticKind::FieldRange => "FieldRangeError",
            DiagnosticKind::LengthMismatch => "LengthMismatch",
            DiagnosticKind::TruncatedBuffer => "TruncatedBuffer",
            DiagnosticKind::IgnoredPresenceBits => "IgnoredPresenceBits",
            DiagnosticKind::TrailingBytes => "TrailingBytes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub category: Option<u8>,
    /// Item id, e.g. `"I048/090"`, when the problem is item-local.
    pub item: Option<&'static str>,
    pub detail: String,
    #[serde(serialize_with = "serialize_hex")]
    pub raw: Vec<u8>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, category: Option<u8>, detail: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            category,
            item: None,
            detail: detail.into(),
            raw: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: &'static str) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_raw(mut self, raw: &[u8]) -> Self {
        self.raw = raw.to_vec();
        self
    }

    /// Diagnostic for a decode error. `None` for errors that are not decode
    /// problems (I/O, config).
    pub fn from_error(err: &AsterixError, category: Option<u8>) -> Option<Self> {
        let kind = match err {
            AsterixError::UnsupportedCategory { .. } => DiagnosticKind::UnsupportedCategory,
            AsterixError::MalformedFspec { .. } => DiagnosticKind::MalformedFspec,
            AsterixError::FieldRange { .. } => DiagnosticKind::FieldRange,
            AsterixError::LengthMismatch { .. } => DiagnosticKind::LengthMismatch,
            AsterixError::TruncatedBuffer { .. } => DiagnosticKind::TruncatedBuffer,
            _ => return None,
        };
        Some(Diagnostic::new(kind, category, err.to_string()).with_raw(err.raw()))
    }
}

/// Receiver of decode diagnostics. Implementations must not block.
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

impl<F> Diagnostics for F
where
    F: Fn(Diagnostic) + Send + Sync,
{
    fn report(&self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// Emits each diagnostic as a structured `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Diagnostics for TracingSink {
    fn report(&self, d: Diagnostic) {
        warn!(
            kind = d.kind.as_str(),
            category = d.category,
            item = d.item,
            raw = %hex_encode(&d.raw),
            "{}",
            d.detail
        );
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Diagnostics for NullSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Forwards diagnostics over a bounded channel. When the channel is full or
/// disconnected the diagnostic is dropped and counted.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Diagnostic>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(tx: Sender<Diagnostic>) -> Self {
        ChannelSink {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Diagnostics for ChannelSink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.tx.try_send(diagnostic) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Bounded diagnostics channel.
pub fn channel(capacity: usize) -> (ChannelSink, Receiver<Diagnostic>) {
    let (tx, rx) = bounded(capacity);
    (ChannelSink::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_channel_sink_counts_drops() {
        let (sink, rx) = channel(1);
        sink.report(Diagnostic::new(DiagnosticKind::TrailingBytes, Some(48), "a"));
        sink.report(Diagnostic::new(DiagnosticKind::TrailingBytes, Some(48), "b"));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().detail, "a");
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let sink = move |d: Diagnostic| store.lock().unwrap().push(d.kind);
        sink.report(Diagnostic::new(DiagnosticKind::FieldRange, None, "x"));
        assert_eq!(*seen.lock().unwrap(), vec![DiagnosticKind::FieldRange]);
    }

    #[test]
    fn test_from_error_keeps_raw() {
        let err = AsterixError::UnsupportedCategory {
            category: 62,
            raw: vec![0x3E, 0x00, 0x03],
        };
        let d = Diagnostic::from_error(&err, Some(62)).unwrap();
        assert_eq!(d.kind, DiagnosticKind::UnsupportedCategory);
        assert_eq!(d.raw, vec![0x3E, 0x00, 0x03]);
        assert!(Diagnostic::from_error(&AsterixError::Config("x".into()), None).is_none());
    }
}
