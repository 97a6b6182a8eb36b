//! Display language resolution.
//!
//! First match wins:
//! 1. Stored preference, if the configuration still supports it
//! 2. Browser language, primary subtag only, if supported
//! 3. The configuration's default language, if supported
//! 4. `en`

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{RuntimeConfiguration, FALLBACK_LANGUAGE};

lazy_static! {
    static ref PRIMARY_SUBTAG: Regex = Regex::new(r"^[a-z]{2,3}$").unwrap();
}

/// `"de-AT"` -> `"de"`, `"pt_BR"` -> `"pt"`. `None` for anything that is
/// not a plausible language subtag.
pub fn primary_subtag(tag: &str) -> Option<String> {
    let primary = tag
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    PRIMARY_SUBTAG.is_match(&primary).then_some(primary)
}

pub fn resolve_language(
    stored: Option<&str>,
    browser: Option<&str>,
    config: &RuntimeConfiguration,
) -> String {
    if let Some(stored) = stored.filter(|s| config.supports_language(s)) {
        return stored.to_string();
    }

    if let Some(primary) = browser.and_then(primary_subtag) {
        if config.supports_language(&primary) {
            return primary;
        }
    }

    if config.supports_language(&config.default_language) {
        return config.default_language.clone();
    }

    FALLBACK_LANGUAGE.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::testing::config_with;

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("de-AT").as_deref(), Some("de"));
        assert_eq!(primary_subtag("pt_BR").as_deref(), Some("pt"));
        assert_eq!(primary_subtag(" EN ").as_deref(), Some("en"));
        assert_eq!(primary_subtag(""), None);
        assert_eq!(primary_subtag("*"), None);
        assert_eq!(primary_subtag("english"), None);
    }

    #[test]
    fn test_precedence() {
        let config = config_with(&[("analytics", false)]);

        assert_eq!(resolve_language(Some("de"), Some("en-US"), &config), "de");
        // Stored preference no longer supported.
        assert_eq!(resolve_language(Some("fr"), Some("de-CH"), &config), "de");
        assert_eq!(resolve_language(None, Some("fr-FR"), &config), "en");
        assert_eq!(resolve_language(None, None, &config), "en");
    }

    #[test]
    fn test_unsupported_default_falls_back_to_english() {
        let mut config = config_with(&[("analytics", false)]);
        config.default_language = "de".to_string();
        assert_eq!(resolve_language(None, Some("es"), &config), "de");

        config.supported_languages = BTreeSet::from(["en".to_string(), "fr".to_string()]);
        assert_eq!(resolve_language(Some("de"), None, &config), "en");
        assert_eq!(resolve_language(None, Some("fr-BE"), &config), "fr");
    }
}
