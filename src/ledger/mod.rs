//! Persistent ledger of export activity.

pub mod log;

pub use log::{ExportLog, ExportStats, LedgerError, LEDGER_FILE_NAME};
