//! Agent log classification.
//!
//! ## Contents
//! - [`Signal`] domain meaning of one log line
//! - [`Classifier`] ordered, first-match-wins rule table
//! - [`LogTail`] incremental, rotation-aware reader of the agent log
//!
//! ## Flow
//! ```text
//! tail ticker (1s) ──► LogTail::read_new_lines() ──► line
//!                                                     ├─► Bus: OutputLine (redacted)
//!                                                     └─► Classifier::classify(line) ──► Signal
//! ```

mod rules;
mod signal;
mod tail;

pub use rules::{Classifier, DEFAULT_RULES, Rule};
pub use signal::Signal;
pub use tail::LogTail;
