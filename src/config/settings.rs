//! Loader settings.
//!
//! Derived from the embedding script tag, e.g.
//! `<script src="https://cdn.example.com/loader.js?site=acme"></script>`.

use chrono::Duration;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use url::Url;

/// Query parameter carrying the site identifier.
pub const SITE_ID_PARAM: &str = "site";

/// Optional query parameter overriding the API base.
pub const API_BASE_PARAM: &str = "api";

/// Default retention for the consent record and anonymous id.
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

lazy_static! {
    static ref SITE_ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("no 'site' parameter on the loader script")]
    MissingSiteId,

    #[error("invalid site id '{0}'")]
    InvalidSiteId(String),

    #[error("invalid loader script url: {0}")]
    Url(#[from] url::ParseError),

    #[error("loader script url has no http(s) origin: '{0}'")]
    InvalidScriptUrl(String),
}

/// Storage keys and retention.
///
/// The consent key is shared across every site using this runtime; records
/// are scoped by the `siteId` they carry.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub consent_key: String,
    pub language_key: String,
    pub anonymous_id_key: String,
    pub retention: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            consent_key: "cmp_consent".to_string(),
            language_key: "cmp_language".to_string(),
            anonymous_id_key: "cmp_anonymous_id".to_string(),
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    pub site_id: String,
    pub api_base: String,
    pub browser_language: Option<String>,
    pub storage: StorageSettings,
}

/// First non-empty value of query parameter `name`.
fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

impl LoaderSettings {
    pub fn new(site_id: &str, api_base: &str) -> Result<Self, SettingsError> {
        if !SITE_ID_PATTERN.is_match(site_id) {
            return Err(SettingsError::InvalidSiteId(site_id.to_string()));
        }
        Ok(Self {
            site_id: site_id.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            browser_language: None,
            storage: StorageSettings::default(),
        })
    }

    /// Build settings from the loader script's own URL.
    pub fn from_script_src(src: &str) -> Result<Self, SettingsError> {
        let url = Url::parse(src)?;

        let site_id = query_value(&url, SITE_ID_PARAM).ok_or(SettingsError::MissingSiteId)?;

        let api_base = match query_value(&url, API_BASE_PARAM) {
            Some(api) => api,
            None => {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(SettingsError::InvalidScriptUrl(src.to_string()));
                }
                format!("{}/api", url.origin().ascii_serialization())
            }
        };

        Self::new(&site_id, &api_base)
    }

    pub fn with_browser_language(mut self, language: Option<&str>) -> Self {
        self.browser_language = language.map(|l| l.to_string());
        self
    }

    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = storage;
        self
    }

    pub fn config_url(&self) -> String {
        format!("{}/runtime/websites/{}", self.api_base, self.site_id)
    }

    pub fn consent_url(&self) -> String {
        format!("{}/runtime/consent", self.api_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_script_src() {
        let settings =
            LoaderSettings::from_script_src("https://cdn.example.com/loader.js?site=acme-01")
                .unwrap();
        assert_eq!(settings.site_id, "acme-01");
        assert_eq!(settings.api_base, "https://cdn.example.com/api");
        assert_eq!(
            settings.config_url(),
            "https://cdn.example.com/api/runtime/websites/acme-01"
        );
        assert_eq!(
            settings.consent_url(),
            "https://cdn.example.com/api/runtime/consent"
        );
    }

    #[test]
    fn test_api_override() {
        let settings = LoaderSettings::from_script_src(
            "https://cdn.example.com/loader.js?api=https%3A%2F%2Fapi.example.com%2F&site=acme#x",
        )
        .unwrap();
        assert_eq!(settings.api_base, "https://api.example.com");
    }

    #[test]
    fn test_missing_site_id() {
        assert_eq!(
            LoaderSettings::from_script_src("https://cdn.example.com/loader.js"),
            Err(SettingsError::MissingSiteId)
        );
        assert_eq!(
            LoaderSettings::from_script_src("https://cdn.example.com/loader.js?site="),
            Err(SettingsError::MissingSiteId)
        );
    }

    #[test]
    fn test_invalid_site_id() {
        assert!(matches!(
            LoaderSettings::from_script_src("https://cdn.example.com/loader.js?site=..%2Fadmin"),
            Err(SettingsError::InvalidSiteId(_))
        ));
    }

    #[test]
    fn test_relative_script_url() {
        assert_eq!(
            LoaderSettings::from_script_src("/loader.js?site=acme"),
            Err(SettingsError::Url(url::ParseError::RelativeUrlWithoutBase))
        );
    }

    #[test]
    fn test_non_http_script_without_api() {
        assert!(matches!(
            LoaderSettings::from_script_src("file:///srv/loader.js?site=acme"),
            Err(SettingsError::InvalidScriptUrl(_))
        ));
    }

    #[test]
    fn test_query_decoding_and_port() {
        let settings =
            LoaderSettings::from_script_src("http://localhost:8080/l.js?x=hello+world%21&site=acme")
                .unwrap();
        assert_eq!(settings.api_base, "http://localhost:8080/api");

        let url = Url::parse("https://x.example/l.js?a=1&b=hello+world%21&c=").unwrap();
        assert_eq!(query_value(&url, "b").as_deref(), Some("hello world!"));
        assert_eq!(query_value(&url, "c"), None);
        assert_eq!(query_value(&url, "missing"), None);
    }
}
