//! Markdown email rendering.
//!
//! The pipeline is pure: it reads templates through the [`TemplateEngine`]
//! seam, never mutates the caller's context and keeps no state between
//! renders. Delivery of the resulting email happens in the caller.
//!
//! [`TemplateEngine`]: crate::application::templates::TemplateEngine

mod service;
mod types;

pub use service::{
    BackendConfig, BackendConfigError, DEFAULT_FALLBACK_MESSAGE, DEFAULT_SUBJECT,
    DEFAULT_TEMPLATE_PREFIX, DEFAULT_TEMPLATE_SUFFIX, MarkdownConverter, MarkdownExtension,
    MarkdownTemplateBackend, PlainTextOptions, UnknownExtension, parse_extensions,
};
pub use types::{
    BlockSet, EmailError, EmailRenderer, EmailRequest, MARKDOWN_CONTENT_KEY, PREHEADER_KEY,
    RenderContext, RenderStage, RenderedEmail, SUBJECT_KEY, TemplateName,
};
