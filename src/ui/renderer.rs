//! Templating boundary.
//!
//! The renderer draws whatever view it is handed and reports user actions
//! back as `UserIntent`s. It holds no consent logic.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::rights::{RightsFormView, RightsRequest, RightsRequestType};
use super::view::{BannerView, SettingsView};

pub trait Renderer {
    fn show_banner(&self, view: &BannerView);

    fn show_settings(&self, view: &SettingsView);

    fn show_rights_form(&self, view: &RightsFormView);

    fn hide_all(&self);
}

impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    fn show_banner(&self, view: &BannerView) {
        (**self).show_banner(view)
    }

    fn show_settings(&self, view: &SettingsView) {
        (**self).show_settings(view)
    }

    fn show_rights_form(&self, view: &RightsFormView) {
        (**self).show_rights_form(view)
    }

    fn hide_all(&self) {
        (**self).hide_all()
    }
}

/// Renderer for hosts without UI; views are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessRenderer;

impl Renderer for HeadlessRenderer {
    fn show_banner(&self, view: &BannerView) {
        log::debug!("RENDER_BANNER language={}", view.language);
    }

    fn show_settings(&self, view: &SettingsView) {
        log::debug!(
            "RENDER_SETTINGS language={} purposes={}",
            view.language,
            view.purposes.len()
        );
    }

    fn show_rights_form(&self, view: &RightsFormView) {
        log::debug!("RENDER_RIGHTS_FORM step={:?}", view.step);
    }

    fn hide_all(&self) {
        log::debug!("RENDER_HIDE_ALL");
    }
}

/// Everything the presentation layer can ask the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    AcceptAll,
    RejectAll,
    OpenSettings,
    SaveSelection(BTreeMap<String, bool>),
    ChangeLanguage(String),
    OpenRightsRequest,
    ChooseRightsType(RightsRequestType),
    RightsBack,
    SubmitRightsRequest(RightsRequest),
    /// Close the settings panel or rights form.
    Close,
}

impl UserIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIntent::AcceptAll => "accept_all",
            UserIntent::RejectAll => "reject_all",
            UserIntent::OpenSettings => "open_settings",
            UserIntent::SaveSelection(_) => "save_selection",
            UserIntent::ChangeLanguage(_) => "change_language",
            UserIntent::OpenRightsRequest => "open_rights_request",
            UserIntent::ChooseRightsType(_) => "choose_rights_type",
            UserIntent::RightsBack => "rights_back",
            UserIntent::SubmitRightsRequest(_) => "submit_rights_request",
            UserIntent::Close => "close",
        }
    }
}
