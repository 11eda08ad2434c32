//! Template engine seam.
//!
//! The pipeline only needs four things from a template engine: the raw
//! source of a named template, a full render, a single-block render and an
//! ad-hoc render of a source string. [`JinjaTemplateEngine`] provides them on
//! top of `minijinja`, whose `{% block %}` syntax the email templates use.

use std::{borrow::Cow, path::PathBuf};

use minijinja::{AutoEscape, Environment, ErrorKind, path_loader};
use thiserror::Error;
use tracing::debug;

use crate::application::render::{EmailError, RenderContext, RenderStage, TemplateName};

/// Identifier of the base layout shipped with the crate.
pub const DEFAULT_BASE_HTML_TEMPLATE: &str = "templated_email/markdown_base.html";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[(
    DEFAULT_BASE_HTML_TEMPLATE,
    include_str!("../../templates/templated_email/markdown_base.html"),
)];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template engine error: {0}")]
    Engine(#[from] minijinja::Error),
}

/// Narrow interface the email pipeline consumes from a template engine.
pub trait TemplateEngine: Send + Sync {
    /// Raw source of `name`, or `None` when no loader knows the template.
    fn source(&self, name: &str) -> Result<Option<String>, TemplateError>;

    fn render(&self, name: &str, context: &RenderContext) -> Result<String, TemplateError>;

    /// Render a single named block. `None` means the block is not defined.
    fn render_block(
        &self,
        name: &str,
        block: &str,
        context: &RenderContext,
    ) -> Result<Option<String>, TemplateError>;

    fn render_str(&self, source: &str, context: &RenderContext) -> Result<String, TemplateError>;
}

/// `minijinja` environment loading from template directories (first hit
/// wins) and falling back to the built-in templates.
pub struct JinjaTemplateEngine {
    env: Environment<'static>,
}

impl JinjaTemplateEngine {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        let loaders: Vec<_> = directories.into_iter().map(path_loader).collect();

        let mut env = Environment::new();
        // Email templates are Markdown, not `.html`; context values must not
        // inject markup into them either.
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_loader(move |name| {
            for loader in &loaders {
                if let Some(source) = loader(name)? {
                    return Ok(Some(source));
                }
            }

            Ok(BUILTIN_TEMPLATES
                .iter()
                .find(|(builtin, _)| *builtin == name)
                .map(|(_, source)| (*source).to_string()))
        });

        Self { env }
    }

    /// Engine with no template directories; only built-ins and templates
    /// registered through [`JinjaTemplateEngine::add_template`] resolve.
    pub fn builtin_only() -> Self {
        Self::new(Vec::new())
    }

    /// Register an in-memory template, shadowing any loader result.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), TemplateError> {
        self.env
            .add_template_owned(name.into(), source.into())
            .map_err(TemplateError::from)
    }
}

impl Default for JinjaTemplateEngine {
    fn default() -> Self {
        Self::builtin_only()
    }
}

impl TemplateEngine for JinjaTemplateEngine {
    fn source(&self, name: &str) -> Result<Option<String>, TemplateError> {
        match self.env.get_template(name) {
            Ok(template) => Ok(Some(template.source().to_string())),
            Err(err) if err.kind() == ErrorKind::TemplateNotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn render(&self, name: &str, context: &RenderContext) -> Result<String, TemplateError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(context)?)
    }

    fn render_block(
        &self,
        name: &str,
        block: &str,
        context: &RenderContext,
    ) -> Result<Option<String>, TemplateError> {
        let template = self.env.get_template(name)?;
        let mut state = template.eval_to_state(context)?;
        match state.render_block(block) {
            Ok(rendered) => Ok(Some(rendered)),
            Err(err) if err.kind() == ErrorKind::UnknownBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn render_str(&self, source: &str, context: &RenderContext) -> Result<String, TemplateError> {
        Ok(self.env.render_str(source, context)?)
    }
}

/// Entities produced by HTML auto-escaping. `&amp;` comes last so that
/// `&amp;lt;` decodes to `&lt;`.
const ESCAPED_ENTITIES: &[(&str, char)] = &[
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#x27;", '\''),
    ("&#39;", '\''),
    ("&#x2f;", '/'),
    ("&#x2F;", '/'),
    ("&amp;", '&'),
];

/// Decode the entities auto-escaping writes, for blocks used as plain text.
pub(crate) fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(position) = rest.find('&') {
        decoded.push_str(&rest[..position]);
        let tail = &rest[position..];
        match ESCAPED_ENTITIES
            .iter()
            .find(|(entity, _)| tail.starts_with(entity))
        {
            Some((entity, decoded_char)) => {
                decoded.push(*decoded_char);
                rest = &tail[entity.len()..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

/// A template confirmed to exist, with its raw source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub name: String,
    pub source: String,
}

/// Turn a template name (or candidate list) into one existing template.
///
/// Each candidate is joined onto `prefix`, and `.{suffix}` is appended unless
/// the candidate already ends with it. Candidates are tried in order.
pub fn resolve_template(
    engine: &dyn TemplateEngine,
    template_name: &TemplateName,
    prefix: &str,
    suffix: &str,
) -> Result<ResolvedTemplate, EmailError> {
    let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
    let extension = format!(".{suffix}");

    for candidate in template_name.candidates() {
        let mut full_name = format!("{prefix}{candidate}");
        if !suffix.is_empty() && !full_name.ends_with(&extension) {
            full_name.push_str(&extension);
        }

        match engine.source(&full_name) {
            Ok(Some(source)) => {
                debug!(
                    target = "application::render::resolve",
                    template = %full_name,
                    "resolved email template"
                );
                return Ok(ResolvedTemplate {
                    name: full_name,
                    source,
                });
            }
            Ok(None) => continue,
            Err(err) => return Err(EmailError::template(RenderStage::ResolveTemplate, &err)),
        }
    }

    Err(EmailError::template_not_found(template_name))
}
