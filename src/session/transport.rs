//! Network seams: configuration fetch and consent audit report.
//!
//! Both calls are one-shot. Nothing here retries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{parse_configuration, ConfigError, RuntimeConfiguration};
use crate::logging::structured::LogContext;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client provided by the host.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        (**self).post_json(url, body)
    }
}

/// Turn the raw outcome of the configuration fetch into an adopted
/// configuration or the reason to fail closed.
pub fn configuration_from_response(
    response: Result<HttpResponse, TransportError>,
    site_id: &str,
    ctx: &LogContext,
) -> Result<RuntimeConfiguration, ConfigError> {
    let response = response.map_err(|e| match e {
        TransportError::Status(code) => ConfigError::Status(code),
        other => ConfigError::Transport(other.to_string()),
    })?;

    if !response.is_success() {
        return Err(ConfigError::Status(response.status));
    }

    parse_configuration(&response.body, site_id, ctx)
}

/// Body of `POST {apiBase}/runtime/consent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentReport {
    pub site_id: String,
    pub version_id: Option<String>,
    pub anonymous_id: String,
    pub preferences: BTreeMap<String, bool>,
}

/// Receiver of consent audit reports.
pub trait AuditSink {
    fn report(&self, report: &ConsentReport) -> Result<(), TransportError>;
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn report(&self, report: &ConsentReport) -> Result<(), TransportError> {
        (**self).report(report)
    }
}

/// Posts reports to the consent endpoint.
pub struct HttpAuditSink<T: Transport> {
    transport: T,
    url: String,
}

impl<T: Transport> HttpAuditSink<T> {
    pub fn new(transport: T, url: &str) -> Self {
        Self {
            transport,
            url: url.to_string(),
        }
    }
}

impl<T: Transport> AuditSink for HttpAuditSink<T> {
    fn report(&self, report: &ConsentReport) -> Result<(), TransportError> {
        let body =
            serde_json::to_value(report).map_err(|e| TransportError::Network(e.to_string()))?;
        let response = self.transport.post_json(&self.url, &body)?;
        if !response.is_success() {
            return Err(TransportError::Status(response.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_json, ok_response, StaticTransport};

    fn ctx() -> LogContext {
        LogContext::new("acme")
    }

    #[test]
    fn test_configuration_from_ok_response() {
        let config = configuration_from_response(
            ok_response(config_json(&[("analytics", false)])),
            "acme",
            &ctx(),
        )
        .unwrap();
        assert_eq!(config.purposes.len(), 1);
    }

    #[test]
    fn test_configuration_failures() {
        assert_eq!(
            configuration_from_response(
                Ok(HttpResponse {
                    status: 404,
                    body: "not found".to_string()
                }),
                "acme",
                &ctx()
            ),
            Err(ConfigError::Status(404))
        );
        assert_eq!(
            configuration_from_response(Err(TransportError::Timeout), "acme", &ctx()),
            Err(ConfigError::Transport("request timed out".to_string()))
        );
        assert_eq!(
            configuration_from_response(Err(TransportError::Status(503)), "acme", &ctx()),
            Err(ConfigError::Status(503))
        );
    }

    #[test]
    fn test_report_wire_format() {
        let transport = Arc::new(StaticTransport::new(Err(TransportError::Timeout)));
        let sink = HttpAuditSink::new(transport.clone(), "https://api.example/runtime/consent");
        let report = ConsentReport {
            site_id: "acme".to_string(),
            version_id: Some("v1".to_string()),
            anonymous_id: "anon-1".to_string(),
            preferences: BTreeMap::from([("marketing".to_string(), true)]),
        };
        sink.report(&report).unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "https://api.example/runtime/consent");
        assert_eq!(
            requests[0].1,
            Some(serde_json::json!({
                "siteId": "acme",
                "versionId": "v1",
                "anonymousId": "anon-1",
                "preferences": {"marketing": true}
            }))
        );
    }
}
