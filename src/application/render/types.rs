use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::templates::TemplateError;

/// Variable mapping supplied for a single render call.
pub type RenderContext = serde_json::Map<String, serde_json::Value>;

/// Reserved context key that overrides any subject found in a template.
pub const SUBJECT_KEY: &str = "subject";
/// Reserved context key that overrides any preheader found in a template.
pub const PREHEADER_KEY: &str = "preheader";
/// Key under which the converted Markdown is handed to the base layout.
pub const MARKDOWN_CONTENT_KEY: &str = "markdown_content";

/// Identifies the template to render: one name or an ordered list of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateName {
    Single(String),
    Candidates(Vec<String>),
}

impl TemplateName {
    /// Candidate names in lookup order.
    pub fn candidates(&self) -> &[String] {
        match self {
            TemplateName::Single(name) => std::slice::from_ref(name),
            TemplateName::Candidates(names) => names.as_slice(),
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateName::Single(name) => f.write_str(name),
            TemplateName::Candidates(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

impl From<&str> for TemplateName {
    fn from(value: &str) -> Self {
        TemplateName::Single(value.to_string())
    }
}

impl From<String> for TemplateName {
    fn from(value: String) -> Self {
        TemplateName::Single(value)
    }
}

impl From<Vec<String>> for TemplateName {
    fn from(value: Vec<String>) -> Self {
        TemplateName::Candidates(value)
    }
}

impl From<&[&str]> for TemplateName {
    fn from(value: &[&str]) -> Self {
        TemplateName::Candidates(value.iter().map(|name| name.to_string()).collect())
    }
}

/// Rendering request passed into the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRequest {
    pub template_name: TemplateName,
    pub context: RenderContext,
    /// Replaces the configured template prefix for this call.
    pub template_dir: Option<String>,
    /// Replaces the configured template suffix for this call.
    pub file_extension: Option<String>,
}

impl EmailRequest {
    pub fn new(template_name: impl Into<TemplateName>, context: RenderContext) -> Self {
        Self {
            template_name: template_name.into(),
            context,
            template_dir: None,
            file_extension: None,
        }
    }

    pub fn with_template_dir(mut self, template_dir: impl Into<String>) -> Self {
        self.template_dir = Some(template_dir.into());
        self
    }

    pub fn with_file_extension(mut self, file_extension: impl Into<String>) -> Self {
        self.file_extension = Some(file_extension.into());
        self
    }
}

/// Named blocks isolated from an email template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockSet {
    /// `None` when the template has no `subject` block.
    pub subject: Option<String>,
    /// `None` when the template has no `preheader` block.
    pub preheader: Option<String>,
    /// Markdown body, either the `content` block or the template minus its header blocks.
    pub content: String,
}

/// Final multipart email produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    /// Layout-wrapped HTML with comments stripped and CSS inlined.
    pub html: String,
    /// Plain-text alternative derived from the content fragment only.
    pub plain: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preheader: Option<String>,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    ResolveTemplate,
    ExtractBlocks,
    RenderMarkdown,
    AssembleLayout,
    StripComments,
    InlineCss,
    GeneratePlainText,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::ResolveTemplate => "resolve_template",
            RenderStage::ExtractBlocks => "extract_blocks",
            RenderStage::RenderMarkdown => "render_markdown",
            RenderStage::AssembleLayout => "assemble_layout",
            RenderStage::StripComments => "strip_comments",
            RenderStage::InlineCss => "inline_css",
            RenderStage::GeneratePlainText => "generate_plain_text",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured errors surfaced by the email pipeline. Each message names the
/// stage that failed.
#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("resolve_template: no Markdown email template found for {name}")]
    TemplateNotFound { name: String },
    #[error("render_markdown: markdown conversion failed: {message}")]
    Markdown { message: String },
    #[error("inline_css: css inlining failed: {message}")]
    CssInlining { message: String },
    #[error("{stage}: rendering failed: {message}")]
    Render { stage: RenderStage, message: String },
}

impl EmailError {
    pub fn template_not_found(name: impl fmt::Display) -> Self {
        Self::TemplateNotFound {
            name: name.to_string(),
        }
    }

    pub fn markdown(message: impl Into<String>) -> Self {
        Self::Markdown {
            message: message.into(),
        }
    }

    pub fn css_inlining(message: impl Into<String>) -> Self {
        Self::CssInlining {
            message: message.into(),
        }
    }

    pub fn render(stage: RenderStage, message: impl Into<String>) -> Self {
        Self::Render {
            stage,
            message: message.into(),
        }
    }

    /// Wrap a template collaborator failure raised while executing `stage`.
    pub fn template(stage: RenderStage, error: &TemplateError) -> Self {
        Self::render(stage, error.to_string())
    }

    /// Stage at which the error was raised.
    pub fn stage(&self) -> RenderStage {
        match self {
            EmailError::TemplateNotFound { .. } => RenderStage::ResolveTemplate,
            EmailError::Markdown { .. } => RenderStage::RenderMarkdown,
            EmailError::CssInlining { .. } => RenderStage::InlineCss,
            EmailError::Render { stage, .. } => *stage,
        }
    }
}

/// Trait exposed by the email pipeline. Implementations must not mutate the
/// request and must be safe to call concurrently.
pub trait EmailRenderer: Send + Sync {
    fn render(&self, request: &EmailRequest) -> Result<RenderedEmail, EmailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_name_has_one_candidate() {
        let name = TemplateName::from("welcome");
        assert_eq!(name.candidates(), ["welcome".to_string()]);
    }

    #[test]
    fn candidate_list_keeps_order() {
        let name = TemplateName::from(&["first", "second"][..]);
        assert_eq!(
            name.candidates(),
            ["first".to_string(), "second".to_string()]
        );
        assert_eq!(name.to_string(), "[first, second]");
    }

    #[test]
    fn error_messages_name_their_stage() {
        let error = EmailError::render(RenderStage::AssembleLayout, "boom");
        assert!(error.to_string().starts_with("assemble_layout:"));
        assert_eq!(error.stage(), RenderStage::AssembleLayout);

        let missing = EmailError::template_not_found("welcome");
        assert!(missing.to_string().contains("resolve_template"));
        assert_eq!(missing.stage(), RenderStage::ResolveTemplate);
    }
}
