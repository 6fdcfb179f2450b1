//! Gateway process ownership.
//!
//! - [`ProcessController`] spawns, monitors, re-attaches and terminates the gateway
//! - [`ProcessTable`] / [`SysinfoTable`] OS process lookup for re-attachment
//! - [`Redactor`] strips the password from forwarded text

mod controller;
mod redact;
mod table;
#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ProcessController, ProcessExit};
pub use redact::{REDACTED, Redactor};
pub use table::{ProcessInfo, ProcessTable, SysinfoTable, select_replacement};
