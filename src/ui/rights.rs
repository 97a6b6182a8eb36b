//! "Exercise your rights" request form.
//!
//! Submission is a local acknowledgement only: the visitor gets a
//! display-only request id and nothing is sent to a server.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightsRequestType {
    Access,
    Rectification,
    Erasure,
    Restriction,
    Portability,
    Objection,
}

impl RightsRequestType {
    pub const ALL: [RightsRequestType; 6] = [
        RightsRequestType::Access,
        RightsRequestType::Rectification,
        RightsRequestType::Erasure,
        RightsRequestType::Restriction,
        RightsRequestType::Portability,
        RightsRequestType::Objection,
    ];

    /// Types that cannot be acted on without a free-text explanation.
    pub fn requires_details(&self) -> bool {
        matches!(
            self,
            RightsRequestType::Rectification | RightsRequestType::Objection
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsRequest {
    pub request_type: RightsRequestType,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RightsStep {
    ChooseType,
    Details,
    Acknowledged,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RightsError {
    #[error("name is required")]
    MissingName,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("details are required for {0:?} requests")]
    MissingDetails(RightsRequestType),

    #[error("request is for {submitted:?} but {chosen:?} was chosen")]
    TypeMismatch {
        chosen: RightsRequestType,
        submitted: RightsRequestType,
    },

    #[error("form is at step {0:?}")]
    WrongStep(RightsStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsAcknowledgement {
    /// Display-only; no server knows this id.
    pub request_id: String,
    pub request_type: RightsRequestType,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightsFormView {
    pub language: String,
    pub step: RightsStep,
    pub available_types: Vec<RightsRequestType>,
    pub chosen: Option<RightsRequestType>,
    pub errors: Vec<String>,
    pub acknowledgement: Option<RightsAcknowledgement>,
}

pub fn validate_request(request: &RightsRequest) -> Result<(), RightsError> {
    if request.full_name.trim().is_empty() {
        return Err(RightsError::MissingName);
    }
    if !EMAIL_PATTERN.is_match(request.email.trim()) {
        return Err(RightsError::InvalidEmail(request.email.clone()));
    }
    if request.request_type.requires_details() && request.details.trim().is_empty() {
        return Err(RightsError::MissingDetails(request.request_type));
    }
    Ok(())
}

/// State of the multi-step form.
#[derive(Debug, Clone, PartialEq)]
pub struct RightsForm {
    step: RightsStep,
    chosen: Option<RightsRequestType>,
    errors: Vec<String>,
    acknowledgement: Option<RightsAcknowledgement>,
}

impl Default for RightsForm {
    fn default() -> Self {
        Self::new()
    }
}

impl RightsForm {
    pub fn new() -> Self {
        Self {
            step: RightsStep::ChooseType,
            chosen: None,
            errors: Vec::new(),
            acknowledgement: None,
        }
    }

    pub fn step(&self) -> RightsStep {
        self.step
    }

    pub fn choose_type(&mut self, request_type: RightsRequestType) -> Result<(), RightsError> {
        if self.step == RightsStep::Acknowledged {
            return Err(RightsError::WrongStep(self.step));
        }
        self.chosen = Some(request_type);
        self.errors.clear();
        self.step = RightsStep::Details;
        Ok(())
    }

    pub fn back(&mut self) {
        if self.step == RightsStep::Details {
            self.step = RightsStep::ChooseType;
            self.errors.clear();
        }
    }

    /// Validate and acknowledge. Validation errors keep the form on the
    /// details step with the message recorded for display.
    pub fn submit(&mut self, request: &RightsRequest) -> Result<RightsAcknowledgement, RightsError> {
        if self.step == RightsStep::ChooseType {
            self.choose_type(request.request_type)?;
        }
        if self.step != RightsStep::Details {
            return Err(RightsError::WrongStep(self.step));
        }

        let result = match self.chosen {
            Some(chosen) if chosen != request.request_type => Err(RightsError::TypeMismatch {
                chosen,
                submitted: request.request_type,
            }),
            _ => validate_request(request),
        };
        if let Err(e) = result {
            self.errors = vec![e.to_string()];
            return Err(e);
        }

        let ack = RightsAcknowledgement {
            request_id: display_request_id(),
            request_type: request.request_type,
            submitted_at: Utc::now(),
        };
        self.errors.clear();
        self.acknowledgement = Some(ack.clone());
        self.step = RightsStep::Acknowledged;
        Ok(ack)
    }

    pub fn view(&self, language: &str) -> RightsFormView {
        RightsFormView {
            language: language.to_string(),
            step: self.step,
            available_types: RightsRequestType::ALL.to_vec(),
            chosen: self.chosen,
            errors: self.errors.clone(),
            acknowledgement: self.acknowledgement.clone(),
        }
    }
}

fn display_request_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("DSR-{}", simple[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(request_type: RightsRequestType) -> RightsRequest {
        RightsRequest {
            request_type,
            full_name: "Sam Doe".to_string(),
            email: "sam@example.com".to_string(),
            details: String::new(),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut form = RightsForm::new();
        assert_eq!(form.step(), RightsStep::ChooseType);
        form.choose_type(RightsRequestType::Access).unwrap();
        assert_eq!(form.step(), RightsStep::Details);

        let ack = form.submit(&request(RightsRequestType::Access)).unwrap();
        assert!(ack.request_id.starts_with("DSR-"));
        assert_eq!(ack.request_id.len(), 12);
        assert_eq!(form.step(), RightsStep::Acknowledged);
        assert_eq!(form.view("en").acknowledgement, Some(ack));
    }

    #[test]
    fn test_validation_errors_stay_on_details() {
        let mut form = RightsForm::new();
        form.choose_type(RightsRequestType::Rectification).unwrap();

        let err = form
            .submit(&request(RightsRequestType::Rectification))
            .unwrap_err();
        assert_eq!(
            err,
            RightsError::MissingDetails(RightsRequestType::Rectification)
        );
        assert_eq!(form.step(), RightsStep::Details);
        assert_eq!(form.view("en").errors.len(), 1);

        let mut bad_email = request(RightsRequestType::Rectification);
        bad_email.email = "not-an-email".to_string();
        bad_email.details = "Wrong address on file".to_string();
        assert!(matches!(
            form.submit(&bad_email),
            Err(RightsError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let mut form = RightsForm::new();
        form.choose_type(RightsRequestType::Erasure).unwrap();
        assert!(matches!(
            form.submit(&request(RightsRequestType::Access)),
            Err(RightsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_back_and_resubmit_after_ack() {
        let mut form = RightsForm::new();
        form.choose_type(RightsRequestType::Erasure).unwrap();
        form.back();
        assert_eq!(form.step(), RightsStep::ChooseType);

        form.submit(&request(RightsRequestType::Portability)).unwrap();
        assert_eq!(
            form.submit(&request(RightsRequestType::Portability)),
            Err(RightsError::WrongStep(RightsStep::Acknowledged))
        );
    }

    #[test]
    fn test_missing_name() {
        let mut req = request(RightsRequestType::Access);
        req.full_name = "  ".to_string();
        assert_eq!(validate_request(&req), Err(RightsError::MissingName));
    }
}
