//! Safe editing core: line-addressed changes, atomic single-file edits,
//! per-file backup history, and all-or-nothing multi-file transactions.

pub mod backup;
pub mod change;
pub mod editor;
pub mod transaction;
pub mod validate;

pub use backup::{BackupEntry, BackupError, BackupVault};
pub use change::{apply_changes, Change, OutOfRange};
pub use editor::{EditError, EditOptions, EditOutcome, Editor};
pub use transaction::{
    FileEdit, FileEditResult, Transaction, TransactionError, TransactionReport, TransactionStatus,
};
pub use validate::{
    CommandFormatter, CommandValidator, Formatter, FormatterRegistry, ValidationIssue, Validator,
    ValidatorRegistry, Verdict,
};
