// Entity Models
//
// Company is the only stored entity; SyncAttempt is its audit trail.
// RegistryNumber guards the one rule every record shares.

pub mod company;
pub mod registry_number;

pub use company::{Company, CompanyUpdate, NewSyncAttempt, SyncAttempt, SyncFields};
pub use registry_number::{is_valid_registry_number, RegistryNumber, REGISTRY_NUMBER_LEN};
