//! Locale collaborators
//!
//! [`LocaleDirectory`] lists the configured locales and marks the default
//! one. [`Localization`] decides which models and attributes are
//! localized.

use crate::error::LocaleError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_schema::{AttributeDescriptor, AttributeType, Definition, Locale, Model};
use strata_store::RecordStore;

/// Locale code made default when none is configured
pub const DEFAULT_LOCALE: &str = "en-US";

/// Source of configured locales
#[async_trait::async_trait]
pub trait LocaleDirectory: Send + Sync {
    /// List every configured locale
    async fn find(&self) -> Result<Vec<Locale>, LocaleError>;

    /// Set `is_default` on each locale according to the configured default
    async fn set_is_default(&self, locales: Vec<Locale>) -> Result<Vec<Locale>, LocaleError>;
}

/// Localization awareness of models and attributes
pub trait Localization: Send + Sync {
    /// Check if a model is localization-aware
    fn is_localized(&self, model: &Model) -> bool;

    /// Names of the localized attributes of a definition
    fn localized_fields(&self, definition: &Definition) -> BTreeSet<String>;
}

fn mark_default(mut locales: Vec<Locale>, default: Option<&str>) -> Vec<Locale> {
    for locale in &mut locales {
        locale.is_default = Some(locale.code.as_str()) == default;
    }
    locales
}

// ============================================================================
// StaticLocaleDirectory
// ============================================================================

/// In-memory locale directory
#[derive(Debug, Default)]
pub struct StaticLocaleDirectory {
    locales: RwLock<Vec<Locale>>,
    default_code: RwLock<Option<String>>,
}

impl StaticLocaleDirectory {
    /// Create directory without a default locale
    #[must_use]
    pub fn new(locales: impl IntoIterator<Item = Locale>) -> Self {
        Self {
            locales: RwLock::new(locales.into_iter().collect()),
            default_code: RwLock::new(None),
        }
    }

    /// Create directory from codes with the given default
    #[must_use]
    pub fn with_default(default: &str, codes: &[&str]) -> Self {
        let directory = Self::new(codes.iter().map(|code| Locale::new(*code)));
        directory.set_default_locale(default);
        directory
    }

    /// Configured default code
    #[must_use]
    pub fn default_locale(&self) -> Option<String> {
        self.default_code.read().clone()
    }

    /// Set the default code, adding the locale if unknown
    pub fn set_default_locale(&self, code: &str) {
        let mut locales = self.locales.write();
        if !locales.iter().any(|l| l.code == code) {
            locales.push(Locale::new(code));
        }
        *self.default_code.write() = Some(code.to_string());
    }

    /// Make [`DEFAULT_LOCALE`] the default when no default is configured
    ///
    /// Returns the default code in effect.
    pub fn ensure_default_locale(&self) -> String {
        if let Some(code) = self.default_locale() {
            return code;
        }
        tracing::info!(locale = DEFAULT_LOCALE, "no default locale, using fallback");
        self.set_default_locale(DEFAULT_LOCALE);
        DEFAULT_LOCALE.to_string()
    }
}

#[async_trait::async_trait]
impl LocaleDirectory for StaticLocaleDirectory {
    async fn find(&self) -> Result<Vec<Locale>, LocaleError> {
        Ok(self.locales.read().clone())
    }

    async fn set_is_default(&self, locales: Vec<Locale>) -> Result<Vec<Locale>, LocaleError> {
        Ok(mark_default(locales, self.default_code.read().as_deref()))
    }
}

// ============================================================================
// StoredLocaleDirectory
// ============================================================================

/// Locale directory backed by a collection of `{id, code, name}` rows
pub struct StoredLocaleDirectory {
    store: Arc<dyn RecordStore>,
    collection: String,
    default_code: Option<String>,
}

impl StoredLocaleDirectory {
    /// Create directory reading `collection`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            default_code: None,
        }
    }

    /// With default locale code
    #[inline]
    #[must_use]
    pub fn with_default(mut self, code: impl Into<String>) -> Self {
        self.default_code = Some(code.into());
        self
    }
}

impl std::fmt::Debug for StoredLocaleDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredLocaleDirectory")
            .field("collection", &self.collection)
            .field("default_code", &self.default_code)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl LocaleDirectory for StoredLocaleDirectory {
    async fn find(&self) -> Result<Vec<Locale>, LocaleError> {
        let rows = self.store.fetch_all(&self.collection).await?;
        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                serde_json::from_value(Value::Object(row.values))
                    .map_err(|source| LocaleError::Malformed { id, source })
            })
            .collect()
    }

    async fn set_is_default(&self, locales: Vec<Locale>) -> Result<Vec<Locale>, LocaleError> {
        Ok(mark_default(locales, self.default_code.as_deref()))
    }
}

// ============================================================================
// I18nPluginOptions
// ============================================================================

/// Localization rules read from `pluginOptions.i18n`
///
/// A model is localized when its `localized` flag is set. An attribute is
/// localized when its own flag is set, when it is a `uid`, or when it is a
/// relation to anything but uploaded media.
#[derive(Debug, Clone, Copy, Default)]
pub struct I18nPluginOptions;

impl I18nPluginOptions {
    /// Check one attribute
    #[must_use]
    pub fn is_localized_attribute(attribute: &AttributeDescriptor) -> bool {
        attribute.localized_flag() == Some(true)
            || attribute.kind == Some(AttributeType::Uid)
            || (attribute.is_relation() && !attribute.is_media())
    }
}

impl Localization for I18nPluginOptions {
    fn is_localized(&self, model: &Model) -> bool {
        model.plugin_options.localized() == Some(true)
    }

    fn localized_fields(&self, definition: &Definition) -> BTreeSet<String> {
        definition
            .attributes
            .iter()
            .filter(|(_, attribute)| Self::is_localized_attribute(attribute))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
