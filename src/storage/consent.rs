//! Consent record persistence.
//!
//! One consent blob under a fixed key shared by every site using the
//! runtime. The record carries its own `siteId`; a record written by another
//! site is treated as absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::logging::structured::LogContext;

use super::store::{KeyValueStore, StorageError};

/// Version of the persisted record layout.
pub const CONSENT_SCHEMA_VERSION: u32 = 1;

/// The visitor's last decision for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub purposes: BTreeMap<String, bool>,
    pub site_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub anonymous_id: String,
    pub language_code: String,
    pub timestamp_millis: i64,
    pub schema_version: u32,
}

/// Lenient shape used to read whatever is in storage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    purposes: Option<BTreeMap<String, bool>>,
    site_id: Option<String>,
    version_id: Option<String>,
    anonymous_id: Option<String>,
    language_code: Option<String>,
    timestamp_millis: Option<i64>,
    schema_version: Option<u32>,
}

/// Why a stored record was not reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    Unparseable(String),
    MissingPurposes,
    ForeignSite(Option<String>),
}

/// Validity check for reuse on a later page load.
pub fn decode_record(raw: &str, site_id: &str) -> Result<ConsentRecord, RecordRejection> {
    let stored: StoredRecord =
        serde_json::from_str(raw).map_err(|e| RecordRejection::Unparseable(e.to_string()))?;

    if stored.site_id.as_deref() != Some(site_id) {
        return Err(RecordRejection::ForeignSite(stored.site_id));
    }
    let purposes = stored.purposes.ok_or(RecordRejection::MissingPurposes)?;

    Ok(ConsentRecord {
        purposes,
        site_id: site_id.to_string(),
        version_id: stored.version_id,
        anonymous_id: stored.anonymous_id.unwrap_or_default(),
        language_code: stored.language_code.unwrap_or_default(),
        timestamp_millis: stored.timestamp_millis.unwrap_or_default(),
        schema_version: stored.schema_version.unwrap_or(CONSENT_SCHEMA_VERSION),
    })
}

/// Storage adapter for the durable consent entities.
pub struct ConsentStorage {
    store: Box<dyn KeyValueStore>,
    settings: StorageSettings,
}

impl ConsentStorage {
    pub fn new(store: Box<dyn KeyValueStore>, settings: StorageSettings) -> Self {
        Self { store, settings }
    }

    /// A valid record for `site_id`, or `None`.
    ///
    /// Read errors count as "no prior consent".
    pub fn load_consent(&self, site_id: &str, ctx: &LogContext) -> Option<ConsentRecord> {
        let raw = match self.store.get(&self.settings.consent_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("{} CONSENT_LOAD found=false", ctx);
                return None;
            }
            Err(e) => {
                log::warn!("{} CONSENT_LOAD_FAILED error={}", ctx, e);
                return None;
            }
        };

        match decode_record(&raw, site_id) {
            Ok(record) => {
                log::info!(
                    "{} CONSENT_LOAD found=true purposes={} version={:?}",
                    ctx,
                    record.purposes.len(),
                    record.version_id
                );
                Some(record)
            }
            Err(reason) => {
                log::info!("{} CONSENT_LOAD_REJECTED reason={:?}", ctx, reason);
                None
            }
        }
    }

    pub fn save_consent(&self, record: &ConsentRecord) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(record).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        self.store
            .set(&self.settings.consent_key, &raw, Some(self.settings.retention))
    }

    pub fn clear_consent(&self) -> Result<(), StorageError> {
        self.store.remove(&self.settings.consent_key)
    }

    pub fn language_preference(&self, ctx: &LogContext) -> Option<String> {
        match self.store.get(&self.settings.language_key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log::warn!("{} LANGUAGE_LOAD_FAILED error={}", ctx, e);
                None
            }
        }
    }

    pub fn set_language_preference(&self, code: &str) -> Result<(), StorageError> {
        self.store
            .set(&self.settings.language_key, code, Some(self.settings.retention))
    }

    /// The browser's anonymous id, created on first use.
    ///
    /// If the store cannot keep it, a fresh id is still returned so the
    /// current decision can be reported.
    pub fn anonymous_id(&self, ctx: &LogContext) -> String {
        match self.store.get(&self.settings.anonymous_id_key) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => log::warn!("{} ANONYMOUS_ID_LOAD_FAILED error={}", ctx, e),
        }

        let id = Uuid::new_v4().to_string();
        match self.store.set(
            &self.settings.anonymous_id_key,
            &id,
            Some(self.settings.retention),
        ) {
            Ok(()) => log::info!("{} ANONYMOUS_ID_CREATED", ctx),
            Err(e) => log::warn!("{} ANONYMOUS_ID_PERSIST_FAILED error={}", ctx, e),
        }
        id
    }
}
