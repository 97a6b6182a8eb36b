//! Runtime configuration served by the configuration endpoint.
//!
//! Fetched once per page load and treated as read-only for the session.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Language every configuration must carry notice text and labels for.
pub const FALLBACK_LANGUAGE: &str = "en";

fn fallback_language() -> String {
    FALLBACK_LANGUAGE.to_string()
}

/// Localized label of a purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeLabel {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_category_info: Option<String>,
}

/// A category of processing the visitor can consent to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeDefinition {
    pub key: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub labels: HashMap<String, PurposeLabel>,
}

impl PurposeDefinition {
    /// Label for `language`, falling back to English.
    pub fn label(&self, language: &str) -> Option<&PurposeLabel> {
        self.labels
            .get(language)
            .or_else(|| self.labels.get(FALLBACK_LANGUAGE))
    }
}

/// Banner and settings copy for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeText {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_all_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_all_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLayout {
    #[default]
    Bar,
    Card,
    Modal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerPosition {
    #[default]
    Bottom,
    Top,
    Center,
}

/// Styling hints passed through to the renderer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerStyle {
    pub layout: BannerLayout,
    pub position: BannerPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// Tenant configuration for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfiguration {
    #[serde(default)]
    pub site_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default = "fallback_language")]
    pub default_language: String,
    #[serde(default)]
    pub supported_languages: BTreeSet<String>,
    #[serde(default)]
    pub notice: HashMap<String, NoticeText>,
    #[serde(default)]
    pub purposes: Vec<PurposeDefinition>,
    #[serde(default)]
    pub banner: BannerStyle,
}

impl RuntimeConfiguration {
    pub fn purpose(&self, key: &str) -> Option<&PurposeDefinition> {
        self.purposes.iter().find(|p| p.key == key)
    }

    /// Languages the visitor may pick from.
    ///
    /// The declared set wins; an empty declaration means "whatever the notice covers".
    pub fn supported_languages(&self) -> BTreeSet<String> {
        if self.supported_languages.is_empty() {
            self.notice.keys().cloned().collect()
        } else {
            self.supported_languages.clone()
        }
    }

    pub fn supports_language(&self, code: &str) -> bool {
        if self.supported_languages.is_empty() {
            self.notice.contains_key(code)
        } else {
            self.supported_languages.contains(code)
        }
    }

    /// Notice text for `language`, falling back to English.
    pub fn notice_for(&self, language: &str) -> Option<&NoticeText> {
        self.notice
            .get(language)
            .or_else(|| self.notice.get(FALLBACK_LANGUAGE))
    }

    pub fn required_purposes(&self) -> impl Iterator<Item = &PurposeDefinition> {
        self.purposes.iter().filter(|p| p.required)
    }
}
