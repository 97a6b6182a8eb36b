//! View models handed to the renderer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{BannerStyle, RuntimeConfiguration};

const DEFAULT_ACCEPT_ALL: &str = "Accept all";
const DEFAULT_REJECT_ALL: &str = "Reject all";
const DEFAULT_SETTINGS: &str = "Settings";
const DEFAULT_SAVE: &str = "Save selection";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerView {
    pub language: String,
    pub languages: Vec<String>,
    pub title: String,
    pub description: String,
    pub accept_all_label: String,
    pub reject_all_label: String,
    pub settings_label: String,
    pub privacy_policy_url: Option<String>,
    pub style: BannerStyle,
}

/// One row of the settings panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeToggle {
    pub key: String,
    pub title: String,
    pub description: String,
    pub data_category_info: Option<String>,
    /// Rendered checked and disabled.
    pub required: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub language: String,
    pub languages: Vec<String>,
    pub title: String,
    pub description: String,
    pub save_label: String,
    pub accept_all_label: String,
    pub reject_all_label: String,
    pub purposes: Vec<PurposeToggle>,
    pub style: BannerStyle,
}

pub fn banner_view(config: &RuntimeConfiguration, language: &str) -> BannerView {
    let notice = config.notice_for(language);

    BannerView {
        language: language.to_string(),
        languages: config.supported_languages().into_iter().collect(),
        title: notice.map(|n| n.title.clone()).unwrap_or_default(),
        description: notice.map(|n| n.description.clone()).unwrap_or_default(),
        accept_all_label: or_default(
            notice.and_then(|n| n.accept_all_label.as_ref()),
            DEFAULT_ACCEPT_ALL,
        ),
        reject_all_label: or_default(
            notice.and_then(|n| n.reject_all_label.as_ref()),
            DEFAULT_REJECT_ALL,
        ),
        settings_label: or_default(
            notice.and_then(|n| n.settings_label.as_ref()),
            DEFAULT_SETTINGS,
        ),
        privacy_policy_url: notice.and_then(|n| n.privacy_policy_url.clone()),
        style: config.banner.clone(),
    }
}

/// Settings panel in configuration order, toggles reflecting `decisions`.
pub fn settings_view(
    config: &RuntimeConfiguration,
    language: &str,
    decisions: &BTreeMap<String, bool>,
) -> SettingsView {
    let banner = banner_view(config, language);
    let save_label = or_default(
        config.notice_for(language).and_then(|n| n.save_label.as_ref()),
        DEFAULT_SAVE,
    );

    let purposes = config
        .purposes
        .iter()
        .map(|purpose| {
            let label = purpose.label(language);
            PurposeToggle {
                key: purpose.key.clone(),
                title: label
                    .map(|l| l.title.clone())
                    .unwrap_or_else(|| purpose.key.clone()),
                description: label.map(|l| l.description.clone()).unwrap_or_default(),
                data_category_info: label.and_then(|l| l.data_category_info.clone()),
                required: purpose.required,
                enabled: purpose.required
                    || decisions.get(&purpose.key).copied().unwrap_or(false),
            }
        })
        .collect();

    SettingsView {
        language: banner.language,
        languages: banner.languages,
        title: banner.title,
        description: banner.description,
        save_label,
        accept_all_label: banner.accept_all_label,
        reject_all_label: banner.reject_all_label,
        purposes,
        style: banner.style,
    }
}

fn or_default(value: Option<&String>, default: &str) -> String {
    value.cloned().unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::config_with;

    #[test]
    fn test_banner_view_defaults_and_fallback() {
        let config = config_with(&[("analytics", false)]);
        let view = banner_view(&config, "fr");
        assert_eq!(view.language, "fr");
        assert_eq!(view.title, "We value your privacy");
        assert_eq!(view.accept_all_label, "Accept all");
        assert_eq!(view.languages, vec!["de", "en"]);
    }

    #[test]
    fn test_banner_view_localized() {
        let config = config_with(&[("analytics", false)]);
        let view = banner_view(&config, "de");
        assert_eq!(view.title, "Wir respektieren Ihre Privatsphäre");
        assert_eq!(view.accept_all_label, "Alle akzeptieren");
    }

    #[test]
    fn test_settings_view_toggles() {
        let config = config_with(&[("essential", true), ("analytics", false), ("ads", false)]);
        let decisions = BTreeMap::from([
            ("essential".to_string(), false),
            ("analytics".to_string(), true),
        ]);
        let view = settings_view(&config, "en", &decisions);
        let toggles: Vec<_> = view
            .purposes
            .iter()
            .map(|p| (p.key.as_str(), p.required, p.enabled))
            .collect();
        assert_eq!(
            toggles,
            vec![
                ("essential", true, true),
                ("analytics", false, true),
                ("ads", false, false)
            ]
        );
        assert_eq!(view.save_label, "Save selection");
    }
}
