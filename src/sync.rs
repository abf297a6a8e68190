// 🔄 Sync Orchestrator - Creation, enrichment and refresh of company records
//
// Creation and enrichment are independent outcomes:
//   Validating -> CheckingDuplicate -> Persisting -> Enriching -> Done
// Any stage before Enriching can fail the request. A failed enrichment only
// shows up as `sync_succeeded = false` on an otherwise successful creation.

use crate::config::Config;
use crate::db::CompanyStore;
use crate::entities::{
    Company, CompanyUpdate, NewSyncAttempt, RegistryNumber, SyncAttempt, SyncFields,
};
use crate::error::{ErrorKind, Result, SyncError};
use crate::registry::{DataSource, LookupResult, RegistryClient};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Validating,
    CheckingDuplicate,
    Persisting,
    Enriching,
    Done,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Validating => "validating",
            SyncStage::CheckingDuplicate => "checking_duplicate",
            SyncStage::Persisting => "persisting",
            SyncStage::Enriching => "enriching",
            SyncStage::Done => "done",
        }
    }
}

fn enter(stage: SyncStage, registry_number: &str) {
    debug!(stage = stage.as_str(), registry_number, "create stage");
}

fn fail<T>(stage: SyncStage, err: SyncError) -> Result<T> {
    debug!(stage = stage.as_str(), error = %err, "create failed");
    Err(err)
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of `create_from_registry_number`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub id: String,
    pub created: bool,
    pub sync_attempted: bool,
    /// None when no sync was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
    /// The record as stored after creation (and enrichment, if it succeeded)
    pub company: Company,
}

/// Result of `sync_company`; lookup failures land here, not in `Err`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub company_id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Updated record on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct SyncOrchestrator {
    store: CompanyStore,
    registry: RegistryClient,
    sync_on_create: bool,
}

impl SyncOrchestrator {
    pub fn new(store: CompanyStore, registry: RegistryClient) -> Self {
        SyncOrchestrator {
            store,
            registry,
            sync_on_create: true,
        }
    }

    /// Skip the enrichment step on creation (records stay bare until synced)
    pub fn with_sync_on_create(mut self, enabled: bool) -> Self {
        self.sync_on_create = enabled;
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = CompanyStore::open(&config.database_path).with_context(|| {
            format!(
                "failed to open company database at {}",
                config.database_path.display()
            )
        })?;
        let registry = RegistryClient::from_config(&config.registry)?;

        Ok(SyncOrchestrator::new(store, registry).with_sync_on_create(config.sync_on_create))
    }

    pub fn store(&self) -> &CompanyStore {
        &self.store
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn sync_on_create(&self) -> bool {
        self.sync_on_create
    }

    pub fn create_from_registry_number(&self, raw: &str) -> Result<CreateOutcome> {
        enter(SyncStage::Validating, raw);
        let number = match RegistryNumber::parse(raw) {
            Ok(number) => number,
            Err(err) => return fail(SyncStage::Validating, err),
        };

        enter(SyncStage::CheckingDuplicate, raw);
        if self.store.find_by_registry_number(&number)?.is_some() {
            return fail(
                SyncStage::CheckingDuplicate,
                SyncError::AlreadyExists(number.to_string()),
            );
        }

        enter(SyncStage::Persisting, raw);
        let company = match self.store.create(number.as_str()) {
            Ok(company) => company,
            Err(err) => return fail(SyncStage::Persisting, err),
        };

        if !self.sync_on_create {
            enter(SyncStage::Done, raw);
            return Ok(CreateOutcome {
                id: company.id.clone(),
                created: true,
                sync_attempted: false,
                sync_succeeded: None,
                source: None,
                sync_error_kind: None,
                sync_error: None,
                company,
            });
        }

        enter(SyncStage::Enriching, raw);
        let outcome = match self.sync_company(&company.id) {
            Ok(sync) => sync,
            // Even a storage failure during enrichment must not undo the insert
            Err(err) => SyncOutcome {
                company_id: company.id.clone(),
                succeeded: false,
                source: None,
                error_kind: Some(err.kind()),
                error: Some(err.to_string()),
                company: None,
            },
        };

        if !outcome.succeeded {
            warn!(
                id = %company.id,
                registry_number = %number,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "company created without registry data"
            );
        }

        enter(SyncStage::Done, raw);
        Ok(CreateOutcome {
            id: company.id.clone(),
            created: true,
            sync_attempted: true,
            sync_succeeded: Some(outcome.succeeded),
            source: outcome.source,
            sync_error_kind: outcome.error_kind,
            sync_error: outcome.error,
            company: outcome.company.unwrap_or(company),
        })
    }

    /// Refresh one record from the registry; the record is untouched on lookup failure
    pub fn sync_company(&self, id: &str) -> Result<SyncOutcome> {
        let company = self.store.get(id)?;

        match self.registry.lookup_number(&company.registry_number) {
            Ok(LookupResult { data, source }) => {
                let updated = self.store.apply_sync_recorded(
                    id,
                    &SyncFields::from(&data),
                    &NewSyncAttempt::success(source),
                )?;

                info!(
                    id = %id,
                    registry_number = %company.registry_number,
                    source = source.as_str(),
                    "sync succeeded"
                );
                Ok(SyncOutcome {
                    company_id: id.to_string(),
                    succeeded: true,
                    source: Some(source),
                    error_kind: None,
                    error: None,
                    company: Some(updated),
                })
            }
            Err(err) => {
                let kind = err.kind();
                let message = err.to_string();
                self.store
                    .record_sync_attempt(id, &NewSyncAttempt::failure(kind, message.clone()))?;

                warn!(
                    id = %id,
                    registry_number = %company.registry_number,
                    error = %message,
                    "sync failed"
                );
                Ok(SyncOutcome {
                    company_id: id.to_string(),
                    succeeded: false,
                    source: None,
                    error_kind: Some(kind),
                    error: Some(message),
                    company: None,
                })
            }
        }
    }

    // ========================================================================
    // PASS-THROUGH OPERATIONS
    // ========================================================================

    pub fn get(&self, id: &str) -> Result<Company> {
        self.store.get(id)
    }

    pub fn list(&self) -> Result<Vec<Company>> {
        self.store.list()
    }

    pub fn update(&self, id: &str, fields: &CompanyUpdate) -> Result<Company> {
        self.store.update(id, fields)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    /// Newest attempt first; unknown ids are NotFound rather than an empty list
    pub fn sync_history(&self, id: &str) -> Result<Vec<SyncAttempt>> {
        self.store.get(id)?;
        self.store.sync_history(id)
    }

    /// Registry preview, nothing is stored
    pub fn lookup(&self, raw: &str) -> Result<LookupResult> {
        self.registry.lookup(raw)
    }
}

// ============================================================================
// TESTS
// ============================================================================
