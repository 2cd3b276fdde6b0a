//! asterix-core: Pure decode library for EUROCONTROL ASTERIX CAT021/CAT048.
//!
//! Bytes in, typed `Message` trees out; decoding does no I/O and holds no
//! global state. Problems that do not stop decoding are handed to an injected
//! [`Diagnostics`] sink. File access is limited to [`config`], which loads and
//! saves the settings file. The `asterix` CLI is a thin consumer of this crate.

pub mod bds;
pub mod bits;
pub mod cat021;
pub mod cat048;
pub mod chain;
pub mod config;
pub mod diag;
pub mod item;
pub mod message;
pub mod record;
pub mod types;
pub mod uap;

// Re-export commonly used types at crate root
pub use bds::{BdsConfig, BdsKind, BdsRegister, Verdict};
pub use diag::{ChannelSink, Diagnostic, DiagnosticKind, Diagnostics, NullSink, TracingSink};
pub use item::{Field, ItemData, ItemValue, Value};
pub use message::{decode, Decoder, Message, MessageStream};
pub use record::Record;
pub use types::*;
pub use uap::{Registry, Uap, UapEntry};
