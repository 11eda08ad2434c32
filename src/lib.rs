//! Render multipart emails (HTML plus plain text) from a single Markdown
//! template.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use templated_email_md::application::{
//!     render::{BackendConfig, MarkdownTemplateBackend, RenderContext},
//!     templates::JinjaTemplateEngine,
//! };
//!
//! let engine = JinjaTemplateEngine::new(vec!["templates".into()]);
//! let backend = MarkdownTemplateBackend::new(BackendConfig::default(), Arc::new(engine));
//!
//! let mut context = RenderContext::new();
//! context.insert("name".into(), "Ada".into());
//! let email = backend.render_email("welcome", &context, None, None)?;
//! println!("{}", email.subject);
//! # Ok::<(), templated_email_md::application::render::EmailError>(())
//! ```

pub mod application;
pub mod config;
pub mod infra;
