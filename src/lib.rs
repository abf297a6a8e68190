// Company Registry Sync - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod logging;
pub mod registry;
pub mod sync;

// Re-export commonly used types
pub use config::{Config, RegistryConfig};
pub use db::{setup_database, CompanyStore};
pub use entities::{
    Company, CompanyUpdate, NewSyncAttempt, RegistryNumber, SyncAttempt, SyncFields,
};
pub use error::{ErrorKind, Result, SyncError};
pub use registry::{
    normalize_address, CompanyData, CvrApiSource, DataSource, FallbackSource, LookupResult,
    RegistryClient, RegistryPayload, RegistrySource, StaticFallback,
};
pub use sync::{CreateOutcome, SyncOrchestrator, SyncOutcome, SyncStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
