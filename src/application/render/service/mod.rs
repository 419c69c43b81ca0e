mod compiler;
mod workspace;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    config::{
        DEFAULT_COMPILER_PATH, DEFAULT_COMPILER_TIMEOUT_SECS, DEFAULT_TEMPLATES_DIR,
        RenderSettings, default_workspace_dir,
    },
    domain::letter::LetterContent,
    infra::templates::TemplateStore,
};

use super::types::{LetterRenderer, RenderError};

pub use self::compiler::CompilerError;
use self::{compiler::LatexCompiler, workspace::Workspace};

/// Base name of the generated source; the compiler derives `.pdf`, `.aux`, … from it.
pub const JOB_NAME: &str = "letter-de";
/// `pdflatex` is always run twice so references and page counts settle.
pub const COMPILER_PASSES: u8 = 2;

#[derive(Debug, Clone)]
pub struct RenderPipelineConfig {
    pub compiler_path: PathBuf,
    pub compiler_timeout: Duration,
    pub templates_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

impl Default for RenderPipelineConfig {
    fn default() -> Self {
        Self {
            compiler_path: PathBuf::from(DEFAULT_COMPILER_PATH),
            compiler_timeout: Duration::from_secs(DEFAULT_COMPILER_TIMEOUT_SECS),
            templates_dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            workspace_dir: default_workspace_dir(),
        }
    }
}

impl From<&RenderSettings> for RenderPipelineConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            compiler_path: settings.compiler_path.clone(),
            compiler_timeout: settings.compiler_timeout,
            templates_dir: settings.templates_dir.clone(),
            workspace_dir: settings.workspace_dir.clone(),
        }
    }
}

/// Renders letters by expanding the LaTeX template and running `pdflatex`
/// inside a throwaway workspace.
#[derive(Debug, Clone)]
pub struct LatexRenderService {
    templates: TemplateStore,
    compiler: LatexCompiler,
    workspace_dir: PathBuf,
}

impl LatexRenderService {
    pub fn new(config: RenderPipelineConfig) -> Self {
        Self {
            templates: TemplateStore::new(config.templates_dir),
            compiler: LatexCompiler::new(config.compiler_path, config.compiler_timeout),
            workspace_dir: config.workspace_dir,
        }
    }
}

#[async_trait]
impl LetterRenderer for LatexRenderService {
    async fn render(&self, letter: &LetterContent) -> Result<Vec<u8>, RenderError> {
        let started_at = Instant::now();

        // Removed on drop, so every early return below cleans up.
        let workspace = Workspace::create(&self.workspace_dir).await.map_err(|err| {
            warn!(
                target = "application::render::latex",
                op = "latex::render",
                result = "error",
                workspace_dir = %self.workspace_dir.display(),
                error_code = "workspace_create",
                error = %err,
                "Failed to create workspace"
            );
            RenderError::Workspace(err)
        })?;

        let tex = self.templates.render_letter(letter).await?;
        let source_path = workspace.file(&format!("{JOB_NAME}.tex"));
        tokio::fs::write(&source_path, tex)
            .await
            .map_err(RenderError::WriteSource)?;

        info!(
            target = "application::render::latex",
            op = "latex::render",
            source = %source_path.display(),
            "LaTeX source rendered"
        );

        for pass in 1..=COMPILER_PASSES {
            self.compiler
                .run_pass(&source_path, workspace.path(), pass)
                .await?;
        }

        let artifact_path = workspace.file(&format!("{JOB_NAME}.pdf"));
        let bytes = tokio::fs::read(&artifact_path).await.map_err(|err| {
            warn!(
                target = "application::render::latex",
                op = "latex::render",
                result = "error",
                artifact = %artifact_path.display(),
                error_code = "artifact_read",
                error = %err,
                "Compiler finished without a readable PDF"
            );
            RenderError::Artifact(err)
        })?;

        info!(
            target = "application::render::latex",
            op = "latex::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            pdf_bytes = bytes.len(),
            "Letter rendered"
        );

        Ok(bytes)
    }
}
