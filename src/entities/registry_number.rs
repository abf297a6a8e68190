// 🔢 Registry Number - The 8-digit business identifier
//
// Parsing is the only way to obtain a `RegistryNumber`, so every value that
// reaches the store or the registry client is already known to be valid.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

pub const REGISTRY_NUMBER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryNumber(String);

impl RegistryNumber {
    /// Accepts exactly 8 ASCII digits; no trimming, no separators
    pub fn parse(raw: &str) -> Result<Self> {
        if is_valid_registry_number(raw) {
            Ok(RegistryNumber(raw.to_string()))
        } else {
            Err(SyncError::InvalidFormat(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn is_valid_registry_number(raw: &str) -> bool {
    raw.len() == REGISTRY_NUMBER_LEN && raw.bytes().all(|b| b.is_ascii_digit())
}

impl std::fmt::Display for RegistryNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RegistryNumber {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        RegistryNumber::parse(s)
    }
}

impl TryFrom<String> for RegistryNumber {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self> {
        RegistryNumber::parse(&value)
    }
}

impl From<RegistryNumber> for String {
    fn from(value: RegistryNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for RegistryNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
