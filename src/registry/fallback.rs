// 📦 Fallback Dataset - Curated registry records for offline operation
//
// Intentionally tiny. This is not a cache: numbers that are not listed here
// still fail when the live registry is down.

use super::{FallbackSource, RegistryPayload};
use crate::entities::RegistryNumber;
use std::collections::HashMap;

pub struct StaticFallback {
    records: HashMap<String, RegistryPayload>,
}

impl StaticFallback {
    pub fn empty() -> Self {
        StaticFallback {
            records: HashMap::new(),
        }
    }

    /// The two companies the system has always shipped with
    pub fn curated() -> Self {
        let mut fallback = StaticFallback::empty();

        // 1. ÅRHUS ApS
        fallback.records.insert(
            "28856636".to_string(),
            RegistryPayload {
                name: Some("ÅRHUS ApS".to_string()),
                address: Some("Testvej 1".to_string()),
                zipcode: Some("8000".to_string()),
                city: Some("Århus C".to_string()),
                phone: Some("12345678".to_string()),
                email: Some("info@aarhus.dk".to_string()),
                industrydesc: Some("IT Services".to_string()),
                ..RegistryPayload::default()
            },
        );

        // 2. Mosevang Mælk ApS
        fallback.records.insert(
            "32365469".to_string(),
            RegistryPayload {
                name: Some("Mosevang Mælk ApS".to_string()),
                address: Some("Mælkevej 42".to_string()),
                zipcode: Some("8600".to_string()),
                city: Some("Silkeborg".to_string()),
                phone: Some("87654321".to_string()),
                email: Some("info@mosevang.dk".to_string()),
                industrydesc: Some("Dairy Products".to_string()),
                ..RegistryPayload::default()
            },
        );

        fallback
    }

    pub fn insert(&mut self, number: RegistryNumber, payload: RegistryPayload) {
        self.records.insert(number.into(), payload);
    }

    pub fn numbers(&self) -> Vec<&str> {
        let mut numbers: Vec<&str> = self.records.keys().map(String::as_str).collect();
        numbers.sort_unstable();
        numbers
    }
}

impl Default for StaticFallback {
    fn default() -> Self {
        Self::curated()
    }
}

impl FallbackSource for StaticFallback {
    fn find(&self, number: &RegistryNumber) -> Option<RegistryPayload> {
        self.records.get(number.as_str()).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
