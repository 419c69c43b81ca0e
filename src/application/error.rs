use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::render::RenderError, domain::error::DomainError, infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text failure used where no letter-specific error page applies.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("letter rendering failed")]
    Render(#[source] RenderError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RenderError> for AppError {
    fn from(error: RenderError) -> Self {
        AppError::Render(error)
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Infra(_) | AppError::Render(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Validation details are echoed back;
    /// everything else stays generic and is only visible in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Domain(DomainError::Validation { message }) => message.clone(),
            AppError::Validation(message) => message.clone(),
            AppError::Render(_) => "The letter could not be generated.".to_string(),
            AppError::Infra(InfraError::Configuration { .. }) => {
                "Service misconfigured".to_string()
            }
            AppError::Infra(_) | AppError::Unexpected(_) => {
                "Unexpected error occurred".to_string()
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self.status_code(), self)
    }
}
