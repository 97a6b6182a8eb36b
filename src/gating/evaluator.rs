//! Consent evaluation.
//!
//! Pure function of the loaded configuration and the purpose-decision map.
//!
//! # Decision Tree
//! 1. No configuration loaded -> blocked
//! 2. Purpose not configured -> blocked, for the rest of the session
//! 3. Purpose required -> allowed, whatever the decision map says
//! 4. Otherwise -> the stored decision, defaulting to blocked

use std::collections::BTreeMap;

use crate::config::RuntimeConfiguration;

/// Outcome of evaluating one purpose tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NoConfiguration,
    UnknownPurpose,
    Required,
    Granted,
    Declined,
}

impl Verdict {
    pub fn allows(&self) -> bool {
        matches!(self, Verdict::Required | Verdict::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NoConfiguration => "no_configuration",
            Verdict::UnknownPurpose => "unknown_purpose",
            Verdict::Required => "required",
            Verdict::Granted => "granted",
            Verdict::Declined => "declined",
        }
    }
}

pub fn evaluate(
    config: Option<&RuntimeConfiguration>,
    decisions: &BTreeMap<String, bool>,
    purpose_tag: &str,
) -> Verdict {
    let Some(config) = config else {
        return Verdict::NoConfiguration;
    };

    match config.purpose(purpose_tag) {
        None => Verdict::UnknownPurpose,
        Some(purpose) if purpose.required => Verdict::Required,
        Some(_) => {
            if decisions.get(purpose_tag).copied().unwrap_or(false) {
                Verdict::Granted
            } else {
                Verdict::Declined
            }
        }
    }
}

pub fn is_consented(
    config: Option<&RuntimeConfiguration>,
    decisions: &BTreeMap<String, bool>,
    purpose_tag: &str,
) -> bool {
    evaluate(config, decisions, purpose_tag).allows()
}
