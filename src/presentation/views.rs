use askama::{Error as AskamaError, Template};
use axum::{
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::{
    application::error::{AppError, HttpError},
    infra::templates::{ErrorView, TemplateStore},
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The letter form, prefilled with today's date.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub today: String,
    pub version: &'static str,
}

impl IndexTemplate {
    pub fn new(today: String) -> Self {
        Self {
            today,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Render a failed letter request through the deployed error page.
///
/// When the error page itself cannot be produced the body degrades to
/// plain text: the template failure on the first line, the message below.
pub async fn render_error_response(templates: &TemplateStore, err: &AppError) -> Response {
    let status = err.status_code();
    let message = err.public_message();

    let mut response = match templates
        .render_error(&ErrorView {
            error: message.clone(),
        })
        .await
    {
        Ok(html) => (status, Html(html)).into_response(),
        Err(template_err) => {
            warn!(
                target = "presentation::views",
                op = "views::render_error_response",
                result = "fallback",
                status = status.as_u16(),
                error = %template_err,
                "Error page unavailable, falling back to plain text"
            );
            let mut response = (status, format!("{template_err}\n{message}")).into_response();
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
    };

    err.report().attach(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::{application::error::ErrorReport, domain::error::DomainError};

    #[test]
    fn index_prefills_date() {
        let html = IndexTemplate::new("2024-12-25".into())
            .render()
            .expect("index renders");
        assert!(html.contains("value=\"2024-12-25\""));
        assert!(html.contains("action=\"/generate\""));
        assert!(html.contains("name=\"signature_space\""));
    }

    #[tokio::test]
    async fn error_page_escapes_message() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join("error.html.tera"),
            "<p class=\"error\">{{ error }}</p>",
        )
        .expect("write template");
        let templates = TemplateStore::new(dir.path());
        let err = AppError::from(DomainError::validation("<script>alert(1)</script>"));

        let response = render_error_response(&templates, &err).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorReport>().is_some());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn missing_error_page_falls_back_to_plain_text() {
        let dir = TempDir::new().expect("temp dir");
        let templates = TemplateStore::new(dir.path());
        let err = AppError::unexpected("disk on fire");

        let response = render_error_response(&templates, &err).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = String::from_utf8(body.to_vec()).expect("utf8");
        let (first, second) = body.split_once('\n').expect("two lines");
        assert!(first.contains("error.html"), "{first}");
        assert_eq!(second, "Unexpected error occurred");
    }
}
