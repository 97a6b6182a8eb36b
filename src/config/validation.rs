//! Fail-closed configuration validation.
//!
//! A configuration is adopted whole or not at all. Any error here halts the
//! session: no banner, nothing unblocked.

use std::collections::HashSet;

use thiserror::Error;

use crate::logging::structured::LogContext;

use super::model::{RuntimeConfiguration, FALLBACK_LANGUAGE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration request failed: {0}")]
    Transport(String),

    #[error("configuration endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed configuration body: {0}")]
    Malformed(String),

    #[error("configuration declares no purposes")]
    NoPurposes,

    #[error("notice text has no '{0}' entry")]
    MissingNoticeFallback(String),

    #[error("purpose '{key}' has no '{language}' label")]
    MissingPurposeLabel { key: String, language: String },

    #[error("purpose key is empty")]
    EmptyPurposeKey,

    #[error("purpose key {0:?} has surrounding whitespace")]
    PaddedPurposeKey(String),

    #[error("purpose '{0}' is declared more than once")]
    DuplicatePurpose(String),

    #[error("configuration belongs to site '{actual}', expected '{expected}'")]
    SiteMismatch { expected: String, actual: String },
}

/// Parse and validate a configuration body for `site_id`.
pub fn parse_configuration(
    body: &str,
    site_id: &str,
    ctx: &LogContext,
) -> Result<RuntimeConfiguration, ConfigError> {
    let mut config: RuntimeConfiguration =
        serde_json::from_str(body).map_err(|e| ConfigError::Malformed(e.to_string()))?;

    if config.site_id.is_empty() {
        config.site_id = site_id.to_string();
    } else if config.site_id != site_id {
        return Err(ConfigError::SiteMismatch {
            expected: site_id.to_string(),
            actual: config.site_id,
        });
    }

    validate_configuration(&config)?;

    log::debug!(
        "{} CONFIG_VALID version={:?} purposes={} languages={:?}",
        ctx,
        config.version_id,
        config.purposes.len(),
        config.supported_languages()
    );

    Ok(config)
}

/// Check the invariants every adopted configuration must satisfy.
pub fn validate_configuration(config: &RuntimeConfiguration) -> Result<(), ConfigError> {
    if config.purposes.is_empty() {
        return Err(ConfigError::NoPurposes);
    }

    if !config.notice.contains_key(FALLBACK_LANGUAGE) {
        return Err(ConfigError::MissingNoticeFallback(
            FALLBACK_LANGUAGE.to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for purpose in &config.purposes {
        if purpose.key.trim().is_empty() {
            return Err(ConfigError::EmptyPurposeKey);
        }
        // Page tags are compared verbatim, so a padded key could never match.
        if purpose.key.trim() != purpose.key {
            return Err(ConfigError::PaddedPurposeKey(purpose.key.clone()));
        }
        if !seen.insert(purpose.key.as_str()) {
            return Err(ConfigError::DuplicatePurpose(purpose.key.clone()));
        }
        if !purpose.labels.contains_key(FALLBACK_LANGUAGE) {
            return Err(ConfigError::MissingPurposeLabel {
                key: purpose.key.clone(),
                language: FALLBACK_LANGUAGE.to_string(),
            });
        }
    }

    Ok(())
}
