mod blocks;
mod comments;
mod config;
mod inline;
mod markdown;
mod plain;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::application::{
    i18n::{IdentityTranslator, Translator},
    render::types::{
        BlockSet, EmailError, EmailRenderer, EmailRequest, MARKDOWN_CONTENT_KEY, PREHEADER_KEY,
        RenderContext, RenderStage, RenderedEmail, SUBJECT_KEY, TemplateName,
    },
    templates::{ResolvedTemplate, TemplateEngine, resolve_template, unescape_html},
};

use blocks::BlockExtractor;
use inline::CssInliner;
use plain::PlainTextGenerator;

pub use config::{
    BackendConfig, BackendConfigError, DEFAULT_FALLBACK_MESSAGE, DEFAULT_SUBJECT,
    DEFAULT_TEMPLATE_PREFIX, DEFAULT_TEMPLATE_SUFFIX, parse_extensions,
};
pub use markdown::{MarkdownConverter, MarkdownExtension, UnknownExtension};
pub use plain::PlainTextOptions;

/// Markdown email pipeline: block extraction, Markdown conversion, base
/// layout, comment stripping, CSS inlining and plain-text generation.
///
/// Holds no per-render state; one instance can serve concurrent renders.
pub struct MarkdownTemplateBackend {
    config: BackendConfig,
    engine: Arc<dyn TemplateEngine>,
    translator: Arc<dyn Translator>,
    markdown: MarkdownConverter,
    inliner: CssInliner,
    plain_text: PlainTextGenerator,
}

impl MarkdownTemplateBackend {
    pub fn new(config: BackendConfig, engine: Arc<dyn TemplateEngine>) -> Self {
        let markdown = MarkdownConverter::new(&config.markdown_extensions);
        let inliner = CssInliner::new(config.base_url.clone());
        let plain_text = PlainTextGenerator::new(config.plain_text.clone());

        Self {
            config,
            engine,
            translator: Arc::new(IdentityTranslator),
            markdown,
            inliner,
            plain_text,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Render `template_name` with `context`.
    ///
    /// `template_dir` and `file_extension` replace the configured template
    /// prefix and suffix for this call only. `context` is never modified.
    pub fn render_email(
        &self,
        template_name: impl Into<TemplateName>,
        context: &RenderContext,
        template_dir: Option<&str>,
        file_extension: Option<&str>,
    ) -> Result<RenderedEmail, EmailError> {
        let template_name = template_name.into();
        self.guard(
            &template_name,
            self.run(&template_name, context, template_dir, file_extension),
        )
    }

    fn guard(
        &self,
        template_name: &TemplateName,
        outcome: Result<RenderedEmail, EmailError>,
    ) -> Result<RenderedEmail, EmailError> {
        match outcome {
            Ok(email) => Ok(email),
            Err(err) if self.config.fail_silently => {
                error!(
                    target = "application::render::email",
                    template = %template_name,
                    stage = %err.stage(),
                    error = %err,
                    "email rendering failed, returning fallback message"
                );
                Ok(self.fallback_email())
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(
        level = "debug",
        target = "application::render::email",
        skip(self, template_name, context),
        fields(template = %template_name)
    )]
    fn run(
        &self,
        template_name: &TemplateName,
        context: &RenderContext,
        template_dir: Option<&str>,
        file_extension: Option<&str>,
    ) -> Result<RenderedEmail, EmailError> {
        let fail_silently = self.config.fail_silently;
        let prefix = template_dir.unwrap_or(&self.config.template_prefix);
        let suffix = file_extension.unwrap_or(&self.config.template_suffix);

        let template = resolve_template(self.engine.as_ref(), template_name, prefix, suffix)?;

        let blocks = self.extract_stage(&template, context)?;

        let content_html = self.markdown.render(&blocks.content, fail_silently)?;
        debug!(
            target = "application::render::render_markdown",
            bytes = content_html.len(),
            "markdown converted"
        );

        let preheader = self.resolve_preheader(context, &blocks);
        let mut layout_context = context.clone();
        layout_context.insert(
            MARKDOWN_CONTENT_KEY.to_string(),
            Value::String(content_html.clone()),
        );
        if let Some(preheader) = &preheader {
            layout_context.insert(PREHEADER_KEY.to_string(), Value::String(preheader.clone()));
        }

        let subject = self.resolve_subject(context, &blocks, &layout_context)?;
        layout_context.insert(SUBJECT_KEY.to_string(), Value::String(subject.clone()));

        let html = self
            .engine
            .render(&self.config.base_html_template, &layout_context)
            .map_err(|err| EmailError::template(RenderStage::AssembleLayout, &err))?;

        let html = comments::strip_comments(&html)?;
        let html = self.inliner.inline(&html, fail_silently)?;
        debug!(
            target = "application::render::inline_css",
            bytes = html.len(),
            "layout assembled"
        );

        let plain = self.plain_text.generate(&content_html)?;

        Ok(RenderedEmail {
            html,
            plain,
            subject,
            preheader,
        })
    }

    fn extract_stage(
        &self,
        template: &ResolvedTemplate,
        context: &RenderContext,
    ) -> Result<BlockSet, EmailError> {
        let blocks = BlockExtractor::new(self.engine.as_ref()).extract(template, context)?;
        debug!(
            target = "application::render::extract_blocks",
            template = %template.name,
            has_subject = blocks.subject.is_some(),
            has_preheader = blocks.preheader.is_some(),
            "blocks extracted"
        );
        Ok(blocks)
    }

    /// Context key, then template block, then the base layout's own
    /// `subject` block, then the configured default, then [`DEFAULT_SUBJECT`].
    fn resolve_subject(
        &self,
        context: &RenderContext,
        blocks: &BlockSet,
        layout_context: &RenderContext,
    ) -> Result<String, EmailError> {
        if let Some(subject) = context_text(context, SUBJECT_KEY) {
            return Ok(subject);
        }
        if let Some(subject) = non_blank(blocks.subject.as_deref()) {
            return Ok(subject);
        }

        let layout_subject = self
            .engine
            .render_block(&self.config.base_html_template, "subject", layout_context)
            .map_err(|err| EmailError::template(RenderStage::AssembleLayout, &err))?;
        let layout_subject = layout_subject.map(|subject| unescape_html(&subject).into_owned());
        if let Some(subject) = non_blank(layout_subject.as_deref()) {
            return Ok(subject);
        }

        Ok(self.default_subject())
    }

    fn resolve_preheader(&self, context: &RenderContext, blocks: &BlockSet) -> Option<String> {
        context_text(context, PREHEADER_KEY)
            .or_else(|| non_blank(blocks.preheader.as_deref()))
            .or_else(|| self.config.default_preheader.clone())
    }

    fn default_subject(&self) -> String {
        self.config
            .default_subject
            .clone()
            .unwrap_or_else(|| self.translator.translate(DEFAULT_SUBJECT))
    }

    fn fallback_email(&self) -> RenderedEmail {
        let message = self.translator.translate(&self.config.fallback_message);
        RenderedEmail {
            html: message.clone(),
            plain: message,
            subject: self.default_subject(),
            preheader: self.config.default_preheader.clone(),
        }
    }
}

impl EmailRenderer for MarkdownTemplateBackend {
    fn render(&self, request: &EmailRequest) -> Result<RenderedEmail, EmailError> {
        self.render_email(
            request.template_name.clone(),
            &request.context,
            request.template_dir.as_deref(),
            request.file_extension.as_deref(),
        )
    }
}

fn context_text(context: &RenderContext, key: &str) -> Option<String> {
    match context.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
