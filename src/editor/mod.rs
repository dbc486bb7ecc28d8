//! Interactive Line Editor
//!
//! A raw-mode, UTF-8-aware single-line editor with history browsing and
//! incremental reverse search, built directly on VT escape sequences.

pub mod utf8;
pub mod history;
pub mod term;
pub mod keys;
pub mod editor;

// Re-exports
pub use editor::{LineEditor, ReadOutcome};
pub use history::{History, HISTORY_SIZE};
pub use keys::{Decode, Key, KeyDecoder};
