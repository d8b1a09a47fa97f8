//! Change detectors
//!
//! Decide from a pair of definitions whether a migration's structural
//! signature is present. A detector never looks at stored data.

use crate::locales::Localization;
use strata_schema::{Definition, Model};

/// Attribute the permission migration moves
pub const FIELDS: &str = "fields";

/// Container the permission migration moves it into
pub const PROPERTIES: &str = "properties";

/// Detects the `fields` → `properties.fields` restructuring
///
/// All of the following must hold:
/// - the subject is the permission model
/// - the previous definition has `fields` and no `properties`
/// - the new definition has `properties` and no `fields`
///
/// A definition holding both attributes is an intermediate rollout state
/// and never matches. Attribute kinds are not compared: the stored
/// permission model declares `fields` as `json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsToProperties {
    uid: String,
}

impl FieldsToProperties {
    /// Create detector for the given permission model uid
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    /// Check the signature
    #[must_use]
    pub fn applies(&self, previous: &Definition, definition: &Definition, subject: &str) -> bool {
        subject == self.uid
            && previous.has_attribute(FIELDS)
            && !previous.has_attribute(PROPERTIES)
            && definition.has_attribute(PROPERTIES)
            && !definition.has_attribute(FIELDS)
    }
}

/// Attributes kept by `definition` that were localized before and no longer are
///
/// Attributes dropped entirely are excluded. The result follows the new
/// definition's attribute order.
pub fn demoted_attributes(
    previous: &Definition,
    definition: &Definition,
    localization: &dyn Localization,
) -> Vec<String> {
    let was = localization.localized_fields(previous);
    let now = localization.localized_fields(definition);
    definition
        .attribute_names()
        .filter(|name| was.contains(*name) && !now.contains(*name))
        .map(str::to_string)
        .collect()
}

/// Detects attributes demoted from localized to shared
///
/// Returns the attributes to migrate, or `None` when the model is not
/// localization-aware or nothing kept was demoted.
pub fn localization_demotion(
    model: &Model,
    previous: &Definition,
    definition: &Definition,
    localization: &dyn Localization,
) -> Option<Vec<String>> {
    if !localization.is_localized(model) {
        return None;
    }
    let demoted = demoted_attributes(previous, definition, localization);
    (!demoted.is_empty()).then_some(demoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locales::I18nPluginOptions;
    use strata_schema::{AttributeDescriptor, AttributeType};

    fn permission(attributes: &[&str]) -> Definition {
        attributes.iter().fold(
            Definition::new("strapi::permission", "strapi_permission"),
            |d, name| d.with_attribute(*name, AttributeDescriptor::new(AttributeType::Json)),
        )
    }

    #[test]
    fn fields_to_properties_matches_exact_signature() {
        let detector = FieldsToProperties::new("strapi::permission");
        let before = permission(&["action", "fields"]);
        let after = permission(&["action", "properties"]);
        assert!(detector.applies(&before, &after, "strapi::permission"));
    }

    #[test]
    fn fields_to_properties_ignores_attribute_kinds() {
        let detector = FieldsToProperties::new("strapi::permission");
        let after = permission(&["properties"]);
        for kind in [AttributeType::Json, AttributeType::String, AttributeType::Text] {
            let before = Definition::new("strapi::permission", "strapi_permission")
                .with_attribute("fields", AttributeDescriptor::new(kind));
            assert!(detector.applies(&before, &after, "strapi::permission"));
        }
        let relation = Definition::new("strapi::permission", "strapi_permission")
            .with_attribute("fields", AttributeDescriptor::relation("role"));
        assert!(detector.applies(&relation, &after, "strapi::permission"));
    }

    #[test]
    fn fields_to_properties_requires_subject() {
        let detector = FieldsToProperties::new("strapi::permission");
        let before = permission(&["fields"]);
        let after = permission(&["properties"]);
        assert!(!detector.applies(&before, &after, "api::article.article"));
    }

    #[test]
    fn fields_to_properties_rejects_partial_states() {
        let detector = FieldsToProperties::new("strapi::permission");
        let uid = "strapi::permission";
        let both = permission(&["fields", "properties"]);
        let fields = permission(&["fields"]);
        let properties = permission(&["properties"]);
        let none = permission(&[]);

        assert!(!detector.applies(&both, &properties, uid));
        assert!(!detector.applies(&fields, &both, uid));
        assert!(!detector.applies(&fields, &fields, uid));
        assert!(!detector.applies(&properties, &properties, uid));
        assert!(!detector.applies(&none, &properties, uid));
        assert!(!detector.applies(&fields, &none, uid));
    }

    fn article(localized: &[(&str, bool)]) -> Definition {
        localized.iter().fold(
            Definition::new("api::article.article", "articles").localized(true),
            |d, (name, flag)| {
                d.with_attribute(
                    *name,
                    AttributeDescriptor::new(AttributeType::String).localized(*flag),
                )
            },
        )
    }

    #[test]
    fn demoted_keeps_new_definition_order() {
        let before = article(&[("title", true), ("price", true), ("body", true)]);
        let after = article(&[("price", false), ("body", true), ("title", false)]);
        assert_eq!(
            demoted_attributes(&before, &after, &I18nPluginOptions),
            vec!["price".to_string(), "title".to_string()]
        );
    }

    #[test]
    fn dropped_attribute_is_not_demoted() {
        let before = article(&[("title", true), ("price", true)]);
        let after = article(&[("title", true)]);
        assert!(demoted_attributes(&before, &after, &I18nPluginOptions).is_empty());
        let model = Model::from_definition(&after);
        assert_eq!(
            localization_demotion(&model, &before, &after, &I18nPluginOptions),
            None
        );
    }

    #[test]
    fn demotion_requires_localized_model() {
        let before = article(&[("title", true)]);
        let after = article(&[("title", false)]);
        let model = Model::from_definition(&after);
        assert_eq!(
            localization_demotion(&model, &before, &after, &I18nPluginOptions),
            Some(vec!["title".to_string()])
        );

        let plain = Model::from_definition(&Definition::new("api::article.article", "articles"));
        assert_eq!(
            localization_demotion(&plain, &before, &after, &I18nPluginOptions),
            None
        );
    }
}
