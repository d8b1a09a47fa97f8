//! Locale descriptors and localization groups

use crate::error::SchemaError;
use crate::record::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Locale descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    /// Locale code (e.g. `en`, `fr-FR`)
    pub code: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether this is the default locale
    #[serde(default)]
    pub is_default: bool,
}

impl Locale {
    /// Create non-default locale
    #[inline]
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            is_default: false,
        }
    }

    /// Mark as default
    #[inline]
    #[must_use]
    pub fn default_locale(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Priority ordering: default first, then code ascending
    #[must_use]
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .is_default
            .cmp(&self.is_default)
            .then_with(|| self.code.cmp(&other.code))
    }
}

/// Sort locales by migration priority
pub fn sort_by_priority(locales: &mut [Locale]) {
    locales.sort_by(Locale::priority_cmp);
}

/// One member of a localization group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationRef {
    /// Member primary key
    pub id: RecordId,
    /// Member locale code
    pub locale: String,
}

impl LocalizationRef {
    /// Create group member reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<RecordId>, locale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locale: locale.into(),
        }
    }
}

/// Decode a record's localization group membership list
///
/// Relational backends store the list as JSON text, document backends as
/// an array. Missing or null means the record has no group.
pub fn decode_localizations(value: Option<&Value>) -> Result<Vec<LocalizationRef>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| SchemaError::MalformedLocalizations(e.to_string())),
        Some(array @ Value::Array(_)) => serde_json::from_value(array.clone())
            .map_err(|e| SchemaError::MalformedLocalizations(e.to_string())),
        Some(other) => Err(SchemaError::MalformedLocalizations(format!(
            "expected list, got {other}"
        ))),
    }
}
