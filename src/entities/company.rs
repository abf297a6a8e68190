// 🏢 Company Entity - Local record of a registered company
//
// Identity: `id` (UUID, never changes) and `registry_number` (never changes)
// Values: name, phone, email, address (overwritten by sync or explicit update)

use super::registry_number::RegistryNumber;
use crate::error::ErrorKind;
use crate::registry::{CompanyData, DataSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// COMPANY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Stable identity assigned by the store
    pub id: String,

    /// Immutable, unique across all companies
    pub registry_number: RegistryNumber,

    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// None until the first successful sync
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Company {
    /// Bare record: no descriptive fields, both timestamps at `now`
    pub fn new(registry_number: RegistryNumber, now: DateTime<Utc>) -> Self {
        Company {
            id: uuid::Uuid::new_v4().to_string(),
            registry_number,
            name: None,
            phone: None,
            email: None,
            address: None,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.last_synced_at.is_some()
    }

    pub fn has_details(&self) -> bool {
        self.name.is_some()
            || self.phone.is_some()
            || self.email.is_some()
            || self.address.is_some()
    }
}

// ============================================================================
// PARTIAL UPDATE (user edits)
// ============================================================================

/// Fields left as `None` are not touched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CompanyUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
    }
}

// ============================================================================
// SYNC FIELDS (registry result, total overwrite)
// ============================================================================

/// All four fields are written, `None` included
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl From<&CompanyData> for SyncFields {
    fn from(data: &CompanyData) -> Self {
        SyncFields {
            name: data.name.clone(),
            phone: data.phone.clone(),
            email: data.email.clone(),
            address: data.address.clone(),
        }
    }
}

// ============================================================================
// SYNC ATTEMPT (audit trail)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub id: i64,
    pub company_id: String,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub source: Option<DataSource>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

/// What the orchestrator hands to the store; the store assigns `id`
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncAttempt {
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub source: Option<DataSource>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl NewSyncAttempt {
    pub fn success(source: DataSource) -> Self {
        NewSyncAttempt {
            attempted_at: Utc::now(),
            succeeded: true,
            source: Some(source),
            error_kind: None,
            error: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: String) -> Self {
        NewSyncAttempt {
            attempted_at: Utc::now(),
            succeeded: false,
            source: None,
            error_kind: Some(kind),
            error: Some(message),
        }
    }
}
