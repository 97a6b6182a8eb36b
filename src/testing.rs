//! Shared fixtures for unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{
    BannerStyle, NoticeText, PurposeDefinition, PurposeLabel, RuntimeConfiguration,
};
use crate::dom::{Document, DomError, MemoryDocument, NodeId};
use crate::session::{AuditSink, ConsentReport, HttpResponse, Transport, TransportError};
use crate::storage::{KeyValueStore, StorageError};
use crate::ui::{BannerView, Renderer, RightsFormView, SettingsView};

/// Valid configuration for site `acme` with the given `(key, required)` purposes.
pub fn config_with(purposes: &[(&str, bool)]) -> RuntimeConfiguration {
    let notice = HashMap::from([
        (
            "en".to_string(),
            NoticeText {
                title: "We value your privacy".to_string(),
                description: "We use cookies to improve your experience.".to_string(),
                accept_all_label: None,
                reject_all_label: None,
                settings_label: None,
                save_label: None,
                privacy_policy_url: Some("https://acme.example/privacy".to_string()),
            },
        ),
        (
            "de".to_string(),
            NoticeText {
                title: "Wir respektieren Ihre Privatsphäre".to_string(),
                description: "Wir verwenden Cookies.".to_string(),
                accept_all_label: Some("Alle akzeptieren".to_string()),
                reject_all_label: Some("Alle ablehnen".to_string()),
                settings_label: Some("Einstellungen".to_string()),
                save_label: Some("Auswahl speichern".to_string()),
                privacy_policy_url: None,
            },
        ),
    ]);

    let purposes = purposes
        .iter()
        .map(|(key, required)| PurposeDefinition {
            key: key.to_string(),
            required: *required,
            labels: HashMap::from([(
                "en".to_string(),
                PurposeLabel {
                    title: key.to_uppercase(),
                    description: format!("{} purpose", key),
                    data_category_info: None,
                },
            )]),
        })
        .collect();

    RuntimeConfiguration {
        site_id: "acme".to_string(),
        version_id: Some("v1".to_string()),
        default_language: "en".to_string(),
        supported_languages: BTreeSet::new(),
        notice,
        purposes,
        banner: BannerStyle::default(),
    }
}

pub fn config_json(purposes: &[(&str, bool)]) -> String {
    serde_json::to_string(&config_with(purposes)).unwrap()
}

pub fn ok_response(body: String) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse { status: 200, body })
}

/// Store whose every operation fails, like a browser with storage disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str, _max_age: Option<Duration>) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disabled".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Banner(BannerView),
    Settings(SettingsView),
    RightsForm(RightsFormView),
    Hidden,
}

/// Renderer that remembers every call.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<Rendered>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Rendered> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<Rendered> {
        self.calls.lock().last().cloned()
    }

    pub fn banner_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Rendered::Banner(_)))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn show_banner(&self, view: &BannerView) {
        self.calls.lock().push(Rendered::Banner(view.clone()));
    }

    fn show_settings(&self, view: &SettingsView) {
        self.calls.lock().push(Rendered::Settings(view.clone()));
    }

    fn show_rights_form(&self, view: &RightsFormView) {
        self.calls.lock().push(Rendered::RightsForm(view.clone()));
    }

    fn hide_all(&self) {
        self.calls.lock().push(Rendered::Hidden);
    }
}

/// Audit sink that keeps reports, optionally failing every call after recording it.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    reports: Mutex<Vec<ConsentReport>>,
    failing: bool,
}

impl RecordingAudit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(Vec::new()),
            failing: true,
        })
    }

    pub fn reports(&self) -> Vec<ConsentReport> {
        self.reports.lock().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn report(&self, report: &ConsentReport) -> Result<(), TransportError> {
        self.reports.lock().push(report.clone());
        if self.failing {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

/// Transport answering every GET with one canned response.
#[derive(Debug)]
pub struct StaticTransport {
    response: Result<HttpResponse, TransportError>,
    requests: Mutex<Vec<(String, Option<Value>)>>,
}

impl StaticTransport {
    pub fn new(response: Result<HttpResponse, TransportError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, Option<Value>)> {
        self.requests.lock().clone()
    }
}

impl Transport for StaticTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push((url.to_string(), None));
        self.response.clone()
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .push((url.to_string(), Some(body.clone())));
        Ok(HttpResponse {
            status: 204,
            body: String::new(),
        })
    }
}

type Listener = Box<dyn Fn(&str, &Value)>;

/// In-memory page that runs a page-script listener after every dispatched event.
pub struct ListeningDocument {
    inner: MemoryDocument,
    listener: Mutex<Option<Listener>>,
}

impl ListeningDocument {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryDocument::new(),
            listener: Mutex::new(None),
        })
    }

    pub fn inner(&self) -> &MemoryDocument {
        &self.inner
    }

    pub fn listen(&self, listener: impl Fn(&str, &Value) + 'static) {
        *self.listener.lock() = Some(Box::new(listener));
    }
}

impl Document for ListeningDocument {
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.inner.elements_by_tag(tag)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.tag_name(node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.attribute(node, name)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.inner.set_attribute(node, name, value)
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.inner.text(node)
    }

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.inner.set_text(node, text)
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        self.inner.create_element(tag)
    }

    fn set_source(&self, node: NodeId, url: &str) -> Result<(), DomError> {
        self.inner.set_source(node, url)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.parent(node)
    }

    fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError> {
        self.inner.replace_child(parent, new, old)
    }

    fn append_to_body(&self, node: NodeId) -> Result<(), DomError> {
        self.inner.append_to_body(node)
    }

    fn dispatch_event(&self, name: &str, detail: &Value) {
        self.inner.dispatch_event(name, detail);
        if let Some(listener) = self.listener.lock().as_ref() {
            listener(name, detail);
        }
    }
}
