// 🔎 Registry Client - External business-registry lookups
//
// Live lookups go through a `RegistrySource` (the CVR HTTP API in production).
// When the live call fails for a transient reason, a `FallbackSource` (a small
// curated dataset) may answer instead. Every answer is tagged with where it
// came from, so degraded data is never mistaken for live data.

pub mod cvr_api;
pub mod fallback;

pub use cvr_api::CvrApiSource;
pub use fallback::StaticFallback;

use crate::config::RegistryConfig;
use crate::entities::RegistryNumber;
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

// ============================================================================
// DATA SOURCE TAG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Fallback => "fallback",
        }
    }

    pub fn parse(s: &str) -> Option<DataSource> {
        match s {
            "live" => Some(DataSource::Live),
            "fallback" => Some(DataSource::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RAW PAYLOAD
// ============================================================================

/// Registry record as delivered, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryPayload {
    pub name: Option<String>,
    pub address: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub industrydesc: Option<String>,
    pub companytype: Option<String>,
    pub employees: Option<String>,
    pub startdate: Option<String>,
}

impl RegistryPayload {
    /// Reads the known fields out of a JSON object; anything else is malformed
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            SyncError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_type(value)
            ))
        })?;

        if obj.is_empty() {
            return Err(SyncError::MalformedResponse("empty JSON object".to_string()));
        }

        Ok(RegistryPayload {
            name: text_field(obj, "name"),
            address: text_field(obj, "address"),
            zipcode: text_field(obj, "zipcode"),
            city: text_field(obj, "city"),
            phone: text_field(obj, "phone"),
            email: text_field(obj, "email"),
            industrydesc: text_field(obj, "industrydesc"),
            companytype: text_field(obj, "companytype"),
            employees: text_field(obj, "employees"),
            startdate: text_field(obj, "startdate"),
        })
    }
}

/// Strings are trimmed, numbers rendered as text, blanks and other types dropped
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// CANONICAL COMPANY DATA
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyData {
    pub name: Option<String>,
    /// Derived: "street, zipcode, city" with absent parts skipped
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub industry: Option<String>,
    pub company_type: Option<String>,
    pub employee_band: Option<String>,
    pub established_date: Option<String>,
}

impl From<RegistryPayload> for CompanyData {
    fn from(payload: RegistryPayload) -> Self {
        let address = normalize_address(
            payload.address.as_deref(),
            payload.zipcode.as_deref(),
            payload.city.as_deref(),
        );

        CompanyData {
            name: payload.name,
            address,
            phone: payload.phone,
            email: payload.email,
            industry: payload.industrydesc,
            company_type: payload.companytype,
            employee_band: payload.employees,
            established_date: payload.startdate,
        }
    }
}

/// Joins the present parts with ", "; `None` when nothing is present
pub fn normalize_address(
    street: Option<&str>,
    zipcode: Option<&str>,
    city: Option<&str>,
) -> Option<String> {
    let parts: Vec<&str> = [street, zipcode, city]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub data: CompanyData,
    pub source: DataSource,
}

// ============================================================================
// SOURCES
// ============================================================================

/// Live registry transport
pub trait RegistrySource: Send + Sync {
    fn fetch(&self, number: &RegistryNumber) -> Result<RegistryPayload>;

    fn name(&self) -> &str {
        "registry"
    }
}

/// Secondary data consulted only after a transient live failure
pub trait FallbackSource: Send + Sync {
    fn find(&self, number: &RegistryNumber) -> Option<RegistryPayload>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// REGISTRY CLIENT
// ============================================================================

pub struct RegistryClient {
    live: Box<dyn RegistrySource>,
    fallback: Option<Box<dyn FallbackSource>>,
}

impl RegistryClient {
    /// Live source only, no fallback
    pub fn new(live: impl RegistrySource + 'static) -> Self {
        RegistryClient {
            live: Box::new(live),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl FallbackSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// CVR API client, plus the curated dataset when enabled
    pub fn from_config(config: &RegistryConfig) -> anyhow::Result<Self> {
        let client = RegistryClient::new(CvrApiSource::new(config)?);

        if config.fallback_enabled {
            Ok(client.with_fallback(StaticFallback::curated()))
        } else {
            Ok(client)
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Format check first (no I/O on failure), then live, then fallback
    pub fn lookup(&self, raw: &str) -> Result<LookupResult> {
        let number = RegistryNumber::parse(raw)?;
        self.lookup_number(&number)
    }

    pub fn lookup_number(&self, number: &RegistryNumber) -> Result<LookupResult> {
        debug!(registry_number = %number, source = self.live.name(), "registry lookup");

        match self.live.fetch(number) {
            Ok(payload) => Ok(LookupResult {
                data: CompanyData::from(payload),
                source: DataSource::Live,
            }),
            Err(err) if err.is_transient() => match self.fallback_for(number) {
                Some(payload) => {
                    warn!(
                        registry_number = %number,
                        error = %err,
                        "live registry lookup failed; using fallback data"
                    );
                    Ok(LookupResult {
                        data: CompanyData::from(payload),
                        source: DataSource::Fallback,
                    })
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// True iff the lookup succeeds and yields a company name
    pub fn validate(&self, raw: &str) -> bool {
        matches!(self.lookup(raw), Ok(result) if result.data.name.is_some())
    }

    fn fallback_for(&self, number: &RegistryNumber) -> Option<RegistryPayload> {
        self.fallback.as_ref().and_then(|f| f.find(number))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Canned answer for `StubSource`
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Payload(Value),
        Unreachable,
        Malformed,
        NotFound,
    }

    /// Live source whose reply can be swapped between calls
    #[derive(Clone)]
    pub(crate) struct StubSource {
        pub reply: Arc<Mutex<Reply>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubSource {
        pub fn new(reply: Reply) -> Self {
            StubSource {
                reply: Arc::new(Mutex::new(reply)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn set(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RegistrySource for StubSource {
        fn fetch(&self, number: &RegistryNumber) -> Result<RegistryPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply.lock().unwrap().clone() {
                Reply::Payload(value) => RegistryPayload::from_json(&value),
                Reply::Unreachable => Err(SyncError::Unreachable("connection refused".into())),
                Reply::Malformed => Err(SyncError::MalformedResponse("not JSON".into())),
                Reply::NotFound => Err(SyncError::NotFound(format!("registry number {}", number))),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    pub(crate) fn aarhus_json() -> Value {
        json!({
            "name": "ÅRHUS ApS",
            "address": "Testvej 1",
            "zipcode": "8000",
            "city": "Århus C",
            "phone": "12345678",
            "email": "info@aarhus.dk",
            "industrydesc": "IT Services"
        })
    }

    #[test]
    fn test_normalize_address_joins_present_parts() {
        assert_eq!(
            normalize_address(Some("Testvej 1"), Some("8000"), Some("Århus C")).as_deref(),
            Some("Testvej 1, 8000, Århus C")
        );
        assert_eq!(
            normalize_address(Some("Testvej 1"), None, Some("Århus C")).as_deref(),
            Some("Testvej 1, Århus C")
        );
        assert_eq!(
            normalize_address(None, Some("8000"), None).as_deref(),
            Some("8000")
        );
        assert_eq!(normalize_address(None, None, None), None);
        assert_eq!(normalize_address(Some(""), Some("  "), None), None);
    }

    #[test]
    fn test_payload_coerces_numbers_and_drops_blanks() {
        let payload = RegistryPayload::from_json(&json!({
            "name": "  Mosevang Mælk ApS ",
            "zipcode": 8600,
            "phone": "",
            "email": null,
            "employees": "5-9",
            "companytype": {"nested": true}
        }))
        .unwrap();

        assert_eq!(payload.name.as_deref(), Some("Mosevang Mælk ApS"));
        assert_eq!(payload.zipcode.as_deref(), Some("8600"));
        assert!(payload.phone.is_none());
        assert!(payload.email.is_none());
        assert!(payload.companytype.is_none());
        assert_eq!(payload.employees.as_deref(), Some("5-9"));
    }

    #[test]
    fn test_payload_rejects_non_objects() {
        for value in [json!(null), json!([1, 2]), json!("text"), json!(42), json!({})] {
            let err = RegistryPayload::from_json(&value).unwrap_err();
            assert!(matches!(err, SyncError::MalformedResponse(_)), "{:?}", value);
        }
    }

    #[test]
    fn test_company_data_maps_all_fields() {
        let payload = RegistryPayload::from_json(&json!({
            "name": "ÅRHUS ApS",
            "address": "Testvej 1",
            "zipcode": "8000",
            "city": "Århus C",
            "industrydesc": "IT Services",
            "companytype": "ApS",
            "employees": "10-19",
            "startdate": "01/02 - 2005"
        }))
        .unwrap();
        let data = CompanyData::from(payload);

        assert_eq!(data.address.as_deref(), Some("Testvej 1, 8000, Århus C"));
        assert_eq!(data.industry.as_deref(), Some("IT Services"));
        assert_eq!(data.company_type.as_deref(), Some("ApS"));
        assert_eq!(data.employee_band.as_deref(), Some("10-19"));
        assert_eq!(data.established_date.as_deref(), Some("01/02 - 2005"));
    }

    #[test]
    fn test_invalid_format_fails_before_io() {
        let stub = StubSource::new(Reply::Payload(aarhus_json()));
        let client = RegistryClient::new(stub.clone());

        let err = client.lookup("1234").unwrap_err();
        assert!(matches!(err, SyncError::InvalidFormat(_)));
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn test_live_lookup_is_tagged_live() {
        let client = RegistryClient::new(StubSource::new(Reply::Payload(aarhus_json())));

        let result = client.lookup("28856636").unwrap();
        assert_eq!(result.source, DataSource::Live);
        assert_eq!(result.data.name.as_deref(), Some("ÅRHUS ApS"));
        assert_eq!(result.data.address.as_deref(), Some("Testvej 1, 8000, Århus C"));
    }

    #[test]
    fn test_fallback_covers_transient_failures() {
        for reply in [Reply::Unreachable, Reply::Malformed] {
            let client = RegistryClient::new(StubSource::new(reply))
                .with_fallback(StaticFallback::curated());

            let result = client.lookup("32365469").unwrap();
            assert_eq!(result.source, DataSource::Fallback);
            assert_eq!(result.data.name.as_deref(), Some("Mosevang Mælk ApS"));
        }
    }

    #[test]
    fn test_fallback_miss_propagates_live_error() {
        let client = RegistryClient::new(StubSource::new(Reply::Unreachable))
            .with_fallback(StaticFallback::curated());

        let err = client.lookup("11111111").unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)));
    }

    #[test]
    fn test_fallback_never_masks_not_found() {
        let client = RegistryClient::new(StubSource::new(Reply::NotFound))
            .with_fallback(StaticFallback::curated());

        let err = client.lookup("28856636").unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_no_fallback_configured() {
        let client = RegistryClient::new(StubSource::new(Reply::Unreachable));
        assert!(!client.has_fallback());

        let err = client.lookup("28856636").unwrap_err();
        assert!(matches!(err, SyncError::Unreachable(_)));
    }

    #[test]
    fn test_from_config_respects_fallback_flag() {
        let without = RegistryClient::from_config(&RegistryConfig {
            fallback_enabled: false,
            ..RegistryConfig::default()
        })
        .unwrap();
        assert!(!without.has_fallback());

        let with = RegistryClient::from_config(&RegistryConfig::default()).unwrap();
        assert!(with.has_fallback());
    }

    #[test]
    fn test_fallback_answers_from_inserted_records() {
        let number = RegistryNumber::parse("11223344").unwrap();
        let mut fallback = StaticFallback::empty();
        fallback.insert(
            number.clone(),
            RegistryPayload {
                name: Some("Nordlys ApS".to_string()),
                city: Some("Aalborg".to_string()),
                ..RegistryPayload::default()
            },
        );
        let client =
            RegistryClient::new(StubSource::new(Reply::Unreachable)).with_fallback(fallback);

        let result = client.lookup_number(&number).unwrap();
        assert_eq!(result.source, DataSource::Fallback);
        assert_eq!(result.data.name.as_deref(), Some("Nordlys ApS"));
        assert_eq!(result.data.address.as_deref(), Some("Aalborg"));
    }

    #[test]
    fn test_validate_requires_name() {
        let named = RegistryClient::new(StubSource::new(Reply::Payload(aarhus_json())));
        assert!(named.validate("28856636"));
        assert!(!named.validate("2885663"));

        let nameless = RegistryClient::new(StubSource::new(Reply::Payload(
            json!({"city": "Silkeborg"}),
        )));
        assert!(!nameless.validate("32365469"));

        let down = RegistryClient::new(StubSource::new(Reply::Unreachable));
        assert!(!down.validate("28856636"));
    }
}
