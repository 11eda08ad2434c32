//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{
    render::{
        DEFAULT_FALLBACK_MESSAGE, DEFAULT_TEMPLATE_PREFIX, DEFAULT_TEMPLATE_SUFFIX,
        MarkdownExtension, PlainTextOptions, parse_extensions,
    },
    templates::DEFAULT_BASE_HTML_TEMPLATE,
};

pub use cli::{
    CliArgs, Command, GlobalOverrides, ListTemplatesArgs, RenderArgs, RenderOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "templated_email";
const ENV_PREFIX: &str = "TEMPLATED_EMAIL";
const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub templates: TemplateSettings,
    pub email: EmailSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    /// Searched in order; the first directory holding a template wins.
    pub directories: Vec<PathBuf>,
    pub prefix: String,
    /// Without the leading dot.
    pub file_extension: String,
    pub base_html_template: String,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub markdown_extensions: Vec<MarkdownExtension>,
    pub default_subject: Option<String>,
    pub default_preheader: Option<String>,
    pub fail_silently: bool,
    pub base_url: Option<Url>,
    pub fallback_message: String,
    pub plain_text: PlainTextOptions,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("templates.directories")
            .with_list_parse_key("email.markdown_extensions"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Command::Render(args) = &cli.command {
        raw.apply_render_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    templates: RawTemplateSettings,
    email: RawEmailSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if !overrides.template_dirs.is_empty() {
            self.templates.directories = Some(overrides.template_dirs.clone());
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(template) = overrides.base_html_template.as_ref() {
            self.templates.base_html_template = Some(template.clone());
        }
        if !overrides.markdown_extensions.is_empty() {
            self.email.markdown_extensions = Some(overrides.markdown_extensions.clone());
        }
        if let Some(subject) = overrides.default_subject.as_ref() {
            self.email.default_subject = Some(subject.clone());
        }
        if let Some(preheader) = overrides.default_preheader.as_ref() {
            self.email.default_preheader = Some(preheader.clone());
        }
        if let Some(fail_silently) = overrides.fail_silently {
            self.email.fail_silently = Some(fail_silently);
        }
        if let Some(url) = overrides.base_url.as_ref() {
            self.email.base_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            templates,
            email,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let templates = build_template_settings(templates)?;
        let email = build_email_settings(email)?;

        Ok(Self {
            logging,
            templates,
            email,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    let directories = templates
        .directories
        .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_TEMPLATE_DIR)]);
    if directories.iter().any(|dir| dir.as_os_str().is_empty()) {
        return Err(LoadError::invalid(
            "templates.directories",
            "paths must not be empty",
        ));
    }

    let prefix = templates
        .prefix
        .unwrap_or_else(|| DEFAULT_TEMPLATE_PREFIX.to_string());

    let file_extension = templates
        .file_extension
        .unwrap_or_else(|| DEFAULT_TEMPLATE_SUFFIX.to_string());
    let file_extension = file_extension
        .trim()
        .trim_start_matches('.')
        .to_string();
    if file_extension.is_empty() {
        return Err(LoadError::invalid(
            "templates.file_extension",
            "extension must not be empty",
        ));
    }

    let base_html_template = templates
        .base_html_template
        .unwrap_or_else(|| DEFAULT_BASE_HTML_TEMPLATE.to_string());
    if base_html_template.trim().is_empty() {
        return Err(LoadError::invalid(
            "templates.base_html_template",
            "template name must not be empty",
        ));
    }

    Ok(TemplateSettings {
        directories,
        prefix,
        file_extension,
        base_html_template,
    })
}

fn build_email_settings(email: RawEmailSettings) -> Result<EmailSettings, LoadError> {
    let markdown_extensions = match email.markdown_extensions {
        Some(names) => parse_extensions(names.iter().map(|name| name.trim()))
            .map_err(|err| LoadError::invalid("email.markdown_extensions", err.to_string()))?,
        None => MarkdownExtension::defaults(),
    };

    let base_url = match non_empty(email.base_url) {
        Some(value) => Some(Url::parse(&value).map_err(|err| {
            LoadError::invalid("email.base_url", format!("invalid url `{value}`: {err}"))
        })?),
        None => None,
    };

    let fallback_message = non_empty(email.fallback_message)
        .unwrap_or_else(|| DEFAULT_FALLBACK_MESSAGE.to_string());

    Ok(EmailSettings {
        markdown_extensions,
        default_subject: non_empty(email.default_subject),
        default_preheader: non_empty(email.default_preheader),
        fail_silently: email.fail_silently.unwrap_or(false),
        base_url,
        fallback_message,
        plain_text: build_plain_text_options(email.plain_text),
    })
}

fn build_plain_text_options(raw: RawPlainTextSettings) -> PlainTextOptions {
    let defaults = PlainTextOptions::default();
    PlainTextOptions {
        ignore_links: raw.ignore_links.unwrap_or(defaults.ignore_links),
        ignore_images: raw.ignore_images.unwrap_or(defaults.ignore_images),
        body_width: raw.body_width.unwrap_or(defaults.body_width),
        ignore_emphasis: raw.ignore_emphasis.unwrap_or(defaults.ignore_emphasis),
        mark_code: raw.mark_code.unwrap_or(defaults.mark_code),
        wrap_links: raw.wrap_links.unwrap_or(defaults.wrap_links),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    directories: Option<Vec<PathBuf>>,
    prefix: Option<String>,
    file_extension: Option<String>,
    base_html_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEmailSettings {
    markdown_extensions: Option<Vec<String>>,
    default_subject: Option<String>,
    default_preheader: Option<String>,
    fail_silently: Option<bool>,
    base_url: Option<String>,
    fallback_message: Option<String>,
    plain_text: RawPlainTextSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPlainTextSettings {
    ignore_links: Option<bool>,
    ignore_images: Option<bool>,
    body_width: Option<usize>,
    ignore_emphasis: Option<bool>,
    mark_code: Option<bool>,
    wrap_links: Option<bool>,
}

#[cfg(test)]
mod tests;
