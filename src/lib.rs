// Operation History - Core Library
// Merges confirmed + pending operations of many accounts into one
// newest-first history, paginated by calendar day.

pub mod account;    // Account capability, tree flattening
pub mod config;     // Environment configuration
pub mod error;
pub mod grouping;   // Day grouping + pagination budget
pub mod loader;     // JSON / CSV account loading
pub mod merge;      // Cursor set + candidate selection
pub mod operation;  // Operation capability, internals flattening
pub mod report;

// Re-export commonly used types
pub use account::{
    Account, AccountLike, Sequence,
    flatten_accounts, validate_sort_order,
};
pub use config::{HistoryConfig, DEFAULT_PAGE_SIZE};
pub use error::HistoryError;
pub use grouping::{
    DailyOperations, DailyOperationsSection, GroupOpsByDayOpts,
    group_account_operations_by_day, group_accounts_operations_by_day,
    group_accounts_operations_by_day_in, group_accounts_operations_by_day_with,
    try_group_accounts_operations_by_day,
};
pub use loader::{load_accounts, load_accounts_json, load_operations_csv, compute_operation_hash};
pub use merge::{CursorSet, OperationMerger};
pub use operation::{
    HistoryOperation, Operation, OperationType,
    flatten_operation_with_internals,
};
pub use report::render_text;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
