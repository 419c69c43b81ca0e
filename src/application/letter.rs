use std::{sync::Arc, time::Instant};

use serde::Deserialize;
use tracing::info;

use crate::domain::{
    date::{german_date, parse_wire_date},
    error::DomainError,
    letter::LetterContent,
};

use super::{
    error::AppError,
    observer::{FailureStage, LetterObserver},
    render::LetterRenderer,
};

/// Raw letter form as submitted by the browser (or read from a TOML file).
///
/// Absent text fields are treated as empty; only `date` is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LetterForm {
    pub subject: Option<String>,
    pub recipient: Option<String>,
    pub recipient_street: Option<String>,
    pub recipient_postal_code: Option<String>,
    pub recipient_city: Option<String>,
    pub sender: Option<String>,
    pub sender_street: Option<String>,
    pub sender_postal_code: Option<String>,
    pub sender_city: Option<String>,
    pub date: Option<String>,
    pub opening: Option<String>,
    pub closing: Option<String>,
    pub content: Option<String>,
    pub signature_space: Option<String>,
}

impl LetterForm {
    /// Check required fields and parse the date into a display string.
    ///
    /// The returned letter is not yet sanitised.
    pub fn validate(self) -> Result<LetterContent, DomainError> {
        let date = self
            .date
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| DomainError::validation("missing required field `date`"))?;
        let date = german_date(parse_wire_date(date)?);

        Ok(LetterContent {
            subject: self.subject.unwrap_or_default(),
            recipient: self.recipient.unwrap_or_default(),
            recipient_street: self.recipient_street.unwrap_or_default(),
            recipient_postal_code: self.recipient_postal_code.unwrap_or_default(),
            recipient_city: self.recipient_city.unwrap_or_default(),
            sender: self.sender.unwrap_or_default(),
            sender_street: self.sender_street.unwrap_or_default(),
            sender_postal_code: self.sender_postal_code.unwrap_or_default(),
            sender_city: self.sender_city.unwrap_or_default(),
            date,
            opening: self.opening.unwrap_or_default(),
            closing: self.closing.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            signature_space: self.signature_space.as_deref() == Some("on"),
        })
    }
}

/// Drives one letter from form input to PDF bytes.
#[derive(Clone)]
pub struct LetterService {
    renderer: Arc<dyn LetterRenderer>,
    observer: Arc<dyn LetterObserver>,
}

impl LetterService {
    pub fn new(renderer: Arc<dyn LetterRenderer>, observer: Arc<dyn LetterObserver>) -> Self {
        Self { renderer, observer }
    }

    /// Validate, sanitise and render. The first failing step short-circuits.
    pub async fn generate(&self, form: LetterForm) -> Result<Vec<u8>, AppError> {
        self.observer.letter_requested();
        let started_at = Instant::now();

        let mut letter = form.validate().inspect_err(|_| {
            self.observer.letter_failed(FailureStage::Validation);
        })?;
        letter.sanitize();

        match self.renderer.render(&letter).await {
            Ok(bytes) => {
                let elapsed = started_at.elapsed();
                self.observer.letter_generated(bytes.len(), elapsed);
                info!(
                    target = "application::letter",
                    op = "letter::generate",
                    result = "ok",
                    elapsed_ms = elapsed.as_millis() as u64,
                    pdf_bytes = bytes.len(),
                    signature_space = letter.signature_space,
                    "Letter generated"
                );
                Ok(bytes)
            }
            Err(err) => {
                self.observer
                    .letter_failed(FailureStage::Render(err.stage()));
                Err(AppError::from(err))
            }
        }
    }

    /// Account for a submission that could not even be decoded.
    pub fn record_rejected_form(&self) {
        self.observer.letter_requested();
        self.observer.letter_failed(FailureStage::Validation);
    }
}
