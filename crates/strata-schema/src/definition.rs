//! Content-type definitions and model handles

use crate::attribute::AttributeDescriptor;
use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// i18n plugin options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct I18nOptions {
    /// Whether the model/attribute holds one value per locale
    #[serde(default)]
    pub localized: bool,
}

/// Plugin options attached to a model or an attribute
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginOptions {
    /// i18n plugin options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<I18nOptions>,

    /// Options of other plugins, kept verbatim
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl PluginOptions {
    /// With i18n `localized` flag
    #[inline]
    #[must_use]
    pub fn with_localized(mut self, localized: bool) -> Self {
        self.i18n = Some(I18nOptions { localized });
        self
    }

    /// i18n `localized` flag, if the i18n options are present
    #[inline]
    #[must_use]
    pub fn localized(&self) -> Option<bool> {
        self.i18n.map(|o| o.localized)
    }

    /// Check if no plugin options are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.i18n.is_none() && self.other.is_empty()
    }
}

/// Immutable schema snapshot of one collection
///
/// Two snapshots exist per schema change event: the one before the
/// structural alteration and the one after. They are compared, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// Model identifier (e.g. `strapi::permission`)
    pub uid: String,
    /// Backing table/collection name
    pub collection_name: String,
    /// Model level plugin options
    #[serde(default, skip_serializing_if = "PluginOptions::is_empty")]
    pub plugin_options: PluginOptions,
    /// Attributes in declaration order
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDescriptor>,
}

impl Definition {
    /// Create definition without attributes
    #[must_use]
    pub fn new(uid: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            collection_name: collection_name.into(),
            plugin_options: PluginOptions::default(),
            attributes: IndexMap::new(),
        }
    }

    /// Parse definition from its JSON form
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(SchemaError::InvalidDefinition)
    }

    /// With attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: AttributeDescriptor) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// With model level i18n `localized` flag
    #[inline]
    #[must_use]
    pub fn localized(mut self, localized: bool) -> Self {
        self.plugin_options = self.plugin_options.with_localized(localized);
        self
    }

    /// Check if attribute exists
    #[inline]
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Get attribute descriptor
    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Attribute names in declaration order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

/// Live model handle a schema change event is raised for
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Model identifier
    pub uid: String,
    /// Backing table/collection name
    pub collection_name: String,
    /// Model level plugin options
    pub plugin_options: PluginOptions,
}

impl Model {
    /// Build handle from the definition being applied
    #[must_use]
    pub fn from_definition(definition: &Definition) -> Self {
        Self {
            uid: definition.uid.clone(),
            collection_name: definition.collection_name.clone(),
            plugin_options: definition.plugin_options.clone(),
        }
    }
}
