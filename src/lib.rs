pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod schema;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::OdooConfig;
pub use error::{Result, SyncError};
pub use sync::{ImportReport, TaskSync};
pub use types::{ExportDocument, ProjectFilter, Record};
