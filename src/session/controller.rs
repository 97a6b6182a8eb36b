//! Consent session controller.
//!
//! One `Session` per page load. It owns the consent state, shares it with
//! the interception guard, and exposes the host-page API.
//!
//! # State Machine
//! ```text
//! Booting -> AwaitingConfig -> BannerShown  -> DecisionRecorded
//!                           -> SilentReplay -> DecisionRecorded
//!                           -> Halted (configuration rejected)
//! ```
//! `withdraw_consent` moves a configured session back to `BannerShown`
//! without re-scanning or re-fetching.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, LoaderSettings, RuntimeConfiguration, FALLBACK_LANGUAGE};
use crate::dom::Document;
use crate::gating::{
    derive_decisions, replay, scan, ConsentAction, ConsentState, ReplayReport, ScriptGuard,
    SharedState,
};
use crate::logging::structured::LogContext;
use crate::storage::{ConsentRecord, ConsentStorage, KeyValueStore, CONSENT_SCHEMA_VERSION};
use crate::ui::{
    banner_view, settings_view, Renderer, RightsAcknowledgement, RightsError, RightsForm,
    RightsRequest, RightsRequestType, UserIntent,
};
use crate::{log_debug, log_error, log_info, log_warn};

use super::language::resolve_language;
use super::transport::{
    configuration_from_response, AuditSink, ConsentReport, HttpResponse, Transport,
    TransportError,
};

/// Event dispatched on the document after every decision or withdrawal.
pub const CONSENT_CHANGED_EVENT: &str = "cmp:consent-changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Booting,
    AwaitingConfig,
    BannerShown,
    SilentReplay,
    DecisionRecorded,
    /// Configuration rejected; nothing will ever be unblocked.
    Halted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session was already booted")]
    AlreadyBooted,

    #[error("session has not been booted")]
    NotBooted,

    #[error("configuration was already delivered")]
    ConfigurationAlreadyDelivered,

    #[error("no configuration available in phase {0:?}")]
    NoConfiguration(SessionPhase),

    #[error("language '{0}' is not supported by this site")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rights(#[from] RightsError),
}

/// The configuration request `boot` hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRequest {
    pub url: String,
}

/// UI surface currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Hidden,
    Banner,
    Settings,
    RightsForm,
}

pub struct Session {
    settings: LoaderSettings,
    ctx: LogContext,
    doc: Arc<dyn Document>,
    storage: ConsentStorage,
    renderer: Box<dyn Renderer>,
    audit: Box<dyn AuditSink>,
    state: SharedState,
    guard: Option<ScriptGuard>,
    phase: SessionPhase,
    language: String,
    adopted_language: Option<String>,
    surface: Surface,
    rights: RightsForm,
}

impl Session {
    pub fn new(
        settings: LoaderSettings,
        doc: Arc<dyn Document>,
        store: Box<dyn KeyValueStore>,
        renderer: Box<dyn Renderer>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        let session_id = Uuid::new_v4().simple().to_string();
        let ctx = LogContext::new(&settings.site_id).with_session(&session_id[..8]);
        let storage = ConsentStorage::new(store, settings.storage.clone());

        Self {
            settings,
            ctx,
            doc,
            storage,
            renderer,
            audit,
            state: ConsentState::new().shared(),
            guard: None,
            phase: SessionPhase::Booting,
            language: FALLBACK_LANGUAGE.to_string(),
            adopted_language: None,
            surface: Surface::Hidden,
            rights: RightsForm::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn site_id(&self) -> &str {
        &self.settings.site_id
    }

    pub fn context(&self) -> &LogContext {
        &self.ctx
    }

    pub fn config_url(&self) -> String {
        self.settings.config_url()
    }

    /// Element factory for page scripts created after boot.
    pub fn guard(&self) -> Option<&ScriptGuard> {
        self.guard.as_ref()
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn configuration(&self) -> Option<Arc<RuntimeConfiguration>> {
        self.state.read().configuration()
    }

    /// Scan, install the guard, then look for a prior decision.
    ///
    /// Nothing touches the network before this returns.
    pub fn boot(&mut self) -> Result<ConfigRequest, SessionError> {
        if self.phase != SessionPhase::Booting {
            return Err(SessionError::AlreadyBooted);
        }
        log_info!(self.ctx, "SESSION_BOOT", api_base = self.settings.api_base);

        let resources = scan(self.doc.as_ref(), &self.ctx);
        {
            let mut state = self.state.write();
            for resource in resources {
                state.register_pending(resource);
            }
        }
        self.guard = Some(ScriptGuard::install(
            self.doc.clone(),
            self.state.clone(),
            &self.ctx,
        ));
        self.phase = SessionPhase::AwaitingConfig;

        if let Some(record) = self.storage.load_consent(&self.settings.site_id, &self.ctx) {
            log_info!(
                self.ctx,
                "PRIOR_CONSENT_ADOPTED",
                purposes = record.purposes.len(),
                language = record.language_code
            );
            if !record.language_code.is_empty() {
                self.language = record.language_code.clone();
                self.adopted_language = Some(record.language_code);
            }
            self.state.write().adopt_decisions(record.purposes);
        }

        Ok(ConfigRequest {
            url: self.settings.config_url(),
        })
    }

    /// Handle the single configuration response.
    ///
    /// A rejected configuration halts the session for good.
    pub fn deliver_configuration(
        &mut self,
        response: Result<HttpResponse, TransportError>,
    ) -> Result<SessionPhase, SessionError> {
        match self.phase {
            SessionPhase::AwaitingConfig => {}
            SessionPhase::Booting => return Err(SessionError::NotBooted),
            _ => return Err(SessionError::ConfigurationAlreadyDelivered),
        }

        let config = match configuration_from_response(response, &self.settings.site_id, &self.ctx)
        {
            Ok(config) => config,
            Err(e) => {
                log_error!(self.ctx, "CONFIG_REJECTED", error = e.to_string(), action = "halt");
                self.phase = SessionPhase::Halted;
                return Err(e.into());
            }
        };

        log_info!(
            self.ctx,
            "CONFIG_LOADED",
            version = config.version_id,
            purposes = config.purposes.len()
        );
        self.state.write().set_configuration(config);
        self.settle_language();

        if self.state.read().has_decision() {
            self.phase = SessionPhase::SilentReplay;
            self.replay_pending();
            self.phase = SessionPhase::DecisionRecorded;
        } else {
            self.show_banner();
            self.phase = SessionPhase::BannerShown;
        }

        Ok(self.phase)
    }

    /// Boot and fetch through a blocking transport.
    pub fn start(&mut self, transport: &dyn Transport) -> Result<SessionPhase, SessionError> {
        let request = self.boot()?;
        let response = transport.get(&request.url);
        self.deliver_configuration(response)
    }

    pub fn accept_all(&mut self) -> Result<ReplayReport, SessionError> {
        self.record_decision(ConsentAction::AcceptAll)
    }

    pub fn reject_all(&mut self) -> Result<ReplayReport, SessionError> {
        self.record_decision(ConsentAction::RejectAll)
    }

    pub fn save_selection(
        &mut self,
        selection: BTreeMap<String, bool>,
    ) -> Result<ReplayReport, SessionError> {
        self.record_decision(ConsentAction::Custom(selection))
    }

    pub fn open_settings(&mut self) -> Result<(), SessionError> {
        let config = self.require_configuration()?;
        let view = settings_view(&config, &self.language, self.state.read().decisions());
        self.renderer.show_settings(&view);
        self.surface = Surface::Settings;
        log_debug!(self.ctx, "SETTINGS_OPENED", language = self.language);
        Ok(())
    }

    /// Close the settings panel or rights form.
    ///
    /// Without a decision the banner comes back; it cannot be dismissed.
    pub fn close(&mut self) {
        if self.surface == Surface::Hidden || self.surface == Surface::Banner {
            return;
        }
        if self.phase == SessionPhase::BannerShown {
            self.show_banner();
        } else {
            self.renderer.hide_all();
            self.surface = Surface::Hidden;
        }
    }

    pub fn change_language(&mut self, code: &str) -> Result<(), SessionError> {
        let config = self.require_configuration()?;
        if !config.supports_language(code) {
            log_warn!(self.ctx, "LANGUAGE_UNSUPPORTED", code = code);
            return Err(SessionError::UnsupportedLanguage(code.to_string()));
        }

        self.language = code.to_string();
        if let Err(e) = self.storage.set_language_preference(code) {
            log_warn!(self.ctx, "LANGUAGE_PERSIST_FAILED", error = e.to_string());
        }
        log_info!(self.ctx, "LANGUAGE_CHANGED", language = code);
        self.render_surface(&config);
        Ok(())
    }

    pub fn open_rights_request(&mut self) -> Result<(), SessionError> {
        let config = self.require_configuration()?;
        self.rights = RightsForm::new();
        self.surface = Surface::RightsForm;
        self.render_surface(&config);
        Ok(())
    }

    pub fn choose_rights_type(&mut self, request_type: RightsRequestType) -> Result<(), SessionError> {
        let config = self.require_rights_form()?;
        self.rights.choose_type(request_type)?;
        self.render_surface(&config);
        Ok(())
    }

    pub fn rights_back(&mut self) -> Result<(), SessionError> {
        let config = self.require_rights_form()?;
        self.rights.back();
        self.render_surface(&config);
        Ok(())
    }

    /// Local acknowledgement only; the request is not sent anywhere.
    pub fn submit_rights_request(
        &mut self,
        request: &RightsRequest,
    ) -> Result<RightsAcknowledgement, SessionError> {
        let config = self.require_rights_form()?;
        let outcome = self.rights.submit(request);
        self.render_surface(&config);

        match outcome {
            Ok(ack) => {
                log_info!(
                    self.ctx,
                    "RIGHTS_REQUEST_ACKNOWLEDGED",
                    request_id = ack.request_id,
                    request_type = ack.request_type
                );
                Ok(ack)
            }
            Err(e) => {
                log_debug!(self.ctx, "RIGHTS_REQUEST_INVALID", error = e.to_string());
                Err(e.into())
            }
        }
    }

    /// Route an intent from the presentation layer.
    pub fn handle_intent(&mut self, intent: UserIntent) -> Result<(), SessionError> {
        log_debug!(self.ctx, "INTENT", intent = intent.as_str());
        match intent {
            UserIntent::AcceptAll => self.accept_all().map(|_| ()),
            UserIntent::RejectAll => self.reject_all().map(|_| ()),
            UserIntent::SaveSelection(selection) => self.save_selection(selection).map(|_| ()),
            UserIntent::OpenSettings => self.open_settings(),
            UserIntent::ChangeLanguage(code) => self.change_language(&code),
            UserIntent::OpenRightsRequest => self.open_rights_request(),
            UserIntent::ChooseRightsType(request_type) => self.choose_rights_type(request_type),
            UserIntent::RightsBack => self.rights_back(),
            UserIntent::SubmitRightsRequest(request) => {
                self.submit_rights_request(&request).map(|_| ())
            }
            UserIntent::Close => {
                self.close();
                Ok(())
            }
        }
    }

    pub fn has_consent(&self, purpose_tag: &str) -> bool {
        self.state.read().is_consented(purpose_tag)
    }

    /// Copy of the decision map; later changes do not show through.
    pub fn get_consent(&self) -> BTreeMap<String, bool> {
        self.state.read().decisions().clone()
    }

    /// Forget the decision and ask again.
    ///
    /// Already activated resources stay active; nothing is re-scanned or
    /// re-fetched.
    pub fn withdraw_consent(&mut self) {
        if let Err(e) = self.storage.clear_consent() {
            log_warn!(self.ctx, "CONSENT_CLEAR_FAILED", error = e.to_string());
        }
        self.state.write().clear_decisions();
        self.adopted_language = None;
        self.notify("withdraw", &BTreeMap::new());
        log_info!(self.ctx, "CONSENT_WITHDRAWN", phase = self.phase);

        match self.phase {
            SessionPhase::BannerShown
            | SessionPhase::SilentReplay
            | SessionPhase::DecisionRecorded => {
                self.show_banner();
                self.phase = SessionPhase::BannerShown;
            }
            SessionPhase::Booting | SessionPhase::AwaitingConfig | SessionPhase::Halted => {}
        }
    }

    fn record_decision(&mut self, action: ConsentAction) -> Result<ReplayReport, SessionError> {
        let config = self.require_configuration()?;
        let decisions = derive_decisions(&config, &action);
        self.state.write().adopt_decisions(decisions.clone());

        let anonymous_id = self.storage.anonymous_id(&self.ctx);
        let record = ConsentRecord {
            purposes: decisions.clone(),
            site_id: self.settings.site_id.clone(),
            version_id: config.version_id.clone(),
            anonymous_id: anonymous_id.clone(),
            language_code: self.language.clone(),
            timestamp_millis: Utc::now().timestamp_millis(),
            schema_version: CONSENT_SCHEMA_VERSION,
        };
        match self.storage.save_consent(&record) {
            Ok(()) => log_info!(
                self.ctx,
                "CONSENT_RECORDED",
                action = action.as_str(),
                purposes = decisions
            ),
            Err(e) => log_warn!(
                self.ctx,
                "CONSENT_PERSIST_FAILED",
                action = action.as_str(),
                error = e.to_string()
            ),
        }

        self.notify(action.as_str(), &decisions);
        self.renderer.hide_all();
        self.surface = Surface::Hidden;

        let replayed = self.replay_pending();
        self.phase = SessionPhase::DecisionRecorded;

        // The audit sink may block on the network; resources are already live.
        let report = ConsentReport {
            site_id: self.settings.site_id.clone(),
            version_id: config.version_id.clone(),
            anonymous_id,
            preferences: decisions,
        };
        if let Err(e) = self.audit.report(&report) {
            log_warn!(self.ctx, "CONSENT_REPORT_FAILED", error = e.to_string());
        }

        Ok(replayed)
    }

    fn replay_pending(&self) -> ReplayReport {
        replay(self.doc.as_ref(), &self.state, self.guard.as_ref(), &self.ctx)
    }

    fn notify(&self, action: &str, purposes: &BTreeMap<String, bool>) {
        self.doc.dispatch_event(
            CONSENT_CHANGED_EVENT,
            &json!({ "action": action, "purposes": purposes }),
        );
    }

    fn require_configuration(&self) -> Result<Arc<RuntimeConfiguration>, SessionError> {
        if self.phase == SessionPhase::Halted {
            return Err(SessionError::NoConfiguration(self.phase));
        }
        self.state
            .read()
            .configuration()
            .ok_or(SessionError::NoConfiguration(self.phase))
    }

    fn require_rights_form(&self) -> Result<Arc<RuntimeConfiguration>, SessionError> {
        let config = self.require_configuration()?;
        if self.surface != Surface::RightsForm {
            return Err(RightsError::WrongStep(self.rights.step()).into());
        }
        Ok(config)
    }

    /// Resolve the display language and persist it if it changed.
    fn settle_language(&mut self) {
        let Some(config) = self.state.read().configuration() else {
            return;
        };
        let stored = self.storage.language_preference(&self.ctx);
        // An explicit choice from an earlier visit outranks the record's language.
        let preferred = stored.clone().or_else(|| self.adopted_language.clone());

        self.language = resolve_language(
            preferred.as_deref(),
            self.settings.browser_language.as_deref(),
            &config,
        );

        if stored.as_deref() != Some(self.language.as_str()) {
            if let Err(e) = self.storage.set_language_preference(&self.language) {
                log_warn!(self.ctx, "LANGUAGE_PERSIST_FAILED", error = e.to_string());
            }
        }
        log_debug!(self.ctx, "LANGUAGE_RESOLVED", language = self.language);
    }

    fn show_banner(&mut self) {
        let Some(config) = self.state.read().configuration() else {
            return;
        };
        self.renderer.show_banner(&banner_view(&config, &self.language));
        self.surface = Surface::Banner;
        log_info!(self.ctx, "BANNER_SHOWN", language = self.language);
    }

    fn render_surface(&self, config: &RuntimeConfiguration) {
        match self.surface {
            Surface::Hidden => {}
            Surface::Banner => self
                .renderer
                .show_banner(&banner_view(config, &self.language)),
            Surface::Settings => self.renderer.show_settings(&settings_view(
                config,
                &self.language,
                self.state.read().decisions(),
            )),
            Surface::RightsForm => self
                .renderer
                .show_rights_form(&self.rights.view(&self.language)),
        }
    }
}
