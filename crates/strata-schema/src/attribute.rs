//! Attribute descriptors

use crate::definition::PluginOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute kind as declared in a content-type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Short text
    String,
    /// Long text
    Text,
    /// Rich text
    Richtext,
    /// E-mail address
    Email,
    /// Password hash
    Password,
    /// Unique slug
    Uid,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    Biginteger,
    /// Floating point
    Float,
    /// Fixed point
    Decimal,
    /// Boolean flag
    Boolean,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time
    Datetime,
    /// Unix timestamp
    Timestamp,
    /// Closed set of strings
    Enumeration,
    /// Free-form structured value
    #[serde(alias = "object")]
    Json,
    /// Embedded component
    Component,
    /// List of components
    Dynamiczone,
    /// Uploaded file reference
    Media,
    /// Anything this crate does not know about
    #[serde(other)]
    Other,
}

impl AttributeType {
    /// Check if values of this kind are containers of sub-fields
    #[inline]
    #[must_use]
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Json | Self::Component | Self::Dynamiczone)
    }
}

/// One attribute of a [`Definition`](crate::Definition)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    /// Declared kind; relations declare `model`/`collection` instead
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttributeType>,

    /// Plugin specific options
    #[serde(default, skip_serializing_if = "PluginOptions::is_empty")]
    pub plugin_options: PluginOptions,

    /// Remaining keys, kept verbatim
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl AttributeDescriptor {
    /// Create descriptor of the given kind
    #[inline]
    #[must_use]
    pub fn new(kind: AttributeType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Create relation descriptor pointing at `target`
    #[must_use]
    pub fn relation(target: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert("model".to_string(), Value::String(target.into()));
        Self {
            kind: None,
            plugin_options: PluginOptions::default(),
            options,
        }
    }

    /// Set the i18n `localized` flag
    #[inline]
    #[must_use]
    pub fn localized(mut self, localized: bool) -> Self {
        self.plugin_options = self.plugin_options.with_localized(localized);
        self
    }

    /// Check if this attribute is a structured container of sub-fields
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.kind.is_some_and(AttributeType::is_structured)
    }

    /// Check if this attribute references another model
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.options.contains_key("model") || self.options.contains_key("collection")
    }

    /// Check if this attribute references uploaded files
    #[must_use]
    pub fn is_media(&self) -> bool {
        if self.kind == Some(AttributeType::Media) {
            return true;
        }
        let plugin = self.options.get("plugin").and_then(Value::as_str);
        self.is_relation() && plugin == Some("upload")
    }

    /// Explicit i18n `localized` flag, if any
    #[inline]
    #[must_use]
    pub fn localized_flag(&self) -> Option<bool> {
        self.plugin_options.localized()
    }
}
