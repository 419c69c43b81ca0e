//! Deployment-time template assets loaded from disk on every use.
//!
//! Templates are read and parsed per render so a broken or missing asset
//! surfaces as a per-request error instead of preventing startup.

use std::{io, path::PathBuf, time::Instant};

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::letter::LetterContent;

/// File name of the LaTeX letter template inside the templates directory.
pub const LETTER_TEMPLATE_FILE: &str = "letter-de.tex.tera";
/// File name of the HTML error page template inside the templates directory.
pub const ERROR_TEMPLATE_FILE: &str = "error.html.tera";

// Registered names decide Tera's autoescaping: `.html` is escaped, `.tex` is not.
const LETTER_TEMPLATE_NAME: &str = "letter-de.tex";
const ERROR_TEMPLATE_NAME: &str = "error.html";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load template `{}`: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse template `{name}`")]
    Parse {
        name: &'static str,
        #[source]
        source: tera::Error,
    },
    #[error("failed to render template `{name}`")]
    Render {
        name: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// Context handed to the error page template.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Expand the letter template with the (already sanitised) letter fields.
    pub async fn render_letter(&self, letter: &LetterContent) -> Result<String, TemplateError> {
        self.render(LETTER_TEMPLATE_FILE, LETTER_TEMPLATE_NAME, letter)
            .await
    }

    /// Expand the error page template; the message is HTML-escaped.
    pub async fn render_error(&self, view: &ErrorView) -> Result<String, TemplateError> {
        self.render(ERROR_TEMPLATE_FILE, ERROR_TEMPLATE_NAME, view)
            .await
    }

    async fn render<T: Serialize>(
        &self,
        file: &str,
        name: &'static str,
        value: &T,
    ) -> Result<String, TemplateError> {
        let started_at = Instant::now();
        let path = self.dir.join(file);

        let source = tokio::fs::read_to_string(&path).await.map_err(|source| {
            error!(
                target = "infra::templates",
                op = "templates::load",
                result = "error",
                template = name,
                path = %path.display(),
                error = %source,
                "Template asset could not be read; check the deployment"
            );
            TemplateError::Load {
                path: path.clone(),
                source,
            }
        })?;

        let mut tera = Tera::default();
        tera.add_raw_template(name, &source).map_err(|source| {
            error!(
                target = "infra::templates",
                op = "templates::parse",
                result = "error",
                template = name,
                path = %path.display(),
                error = ?source,
                "Template asset is malformed; check the deployment"
            );
            TemplateError::Parse { name, source }
        })?;

        let context =
            Context::from_serialize(value).map_err(|source| TemplateError::Render { name, source })?;
        let rendered = tera
            .render(name, &context)
            .map_err(|source| TemplateError::Render { name, source })?;

        debug!(
            target = "infra::templates",
            op = "templates::render",
            result = "ok",
            template = name,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            bytes = rendered.len(),
            "Template rendered"
        );

        Ok(rendered)
    }
}
