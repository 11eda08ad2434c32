use thiserror::Error;
use url::Url;

use crate::application::templates::DEFAULT_BASE_HTML_TEMPLATE;

use super::{markdown::MarkdownExtension, plain::PlainTextOptions};

/// Subject used when neither the context, the templates nor the
/// configuration provide one. Passed through the translator.
pub const DEFAULT_SUBJECT: &str = "No Subject";
/// Body of the synthetic email returned when a fail-silently render fails.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "This email could not be rendered.";
pub const DEFAULT_TEMPLATE_PREFIX: &str = "templated_email/";
pub const DEFAULT_TEMPLATE_SUFFIX: &str = "md";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendConfigError {
    #[error("unknown markdown extension `{name}`")]
    UnknownExtension { name: String },
    #[error("invalid base url `{value}`: {message}")]
    InvalidBaseUrl { value: String, message: String },
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
}

/// Resolved, immutable configuration of a [`super::MarkdownTemplateBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub template_prefix: String,
    /// File extension without the leading dot.
    pub template_suffix: String,
    pub base_html_template: String,
    pub markdown_extensions: Vec<MarkdownExtension>,
    pub plain_text: PlainTextOptions,
    pub default_subject: Option<String>,
    pub default_preheader: Option<String>,
    pub fail_silently: bool,
    /// Relative `href`/`src` values in the final HTML are resolved against this.
    pub base_url: Option<Url>,
    pub fallback_message: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            template_prefix: DEFAULT_TEMPLATE_PREFIX.to_string(),
            template_suffix: DEFAULT_TEMPLATE_SUFFIX.to_string(),
            base_html_template: DEFAULT_BASE_HTML_TEMPLATE.to_string(),
            markdown_extensions: MarkdownExtension::defaults(),
            plain_text: PlainTextOptions::default(),
            default_subject: None,
            default_preheader: None,
            fail_silently: false,
            base_url: None,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl BackendConfig {
    pub fn with_template_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.template_prefix = prefix.into();
        self
    }

    /// A leading `.` is dropped.
    pub fn with_template_suffix(
        mut self,
        suffix: impl AsRef<str>,
    ) -> Result<Self, BackendConfigError> {
        let suffix = suffix.as_ref();
        let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
        if suffix.is_empty() {
            return Err(BackendConfigError::Empty {
                field: "template_suffix",
            });
        }
        self.template_suffix = suffix.to_string();
        Ok(self)
    }

    pub fn with_base_html_template(
        mut self,
        template: impl Into<String>,
    ) -> Result<Self, BackendConfigError> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(BackendConfigError::Empty {
                field: "base_html_template",
            });
        }
        self.base_html_template = template;
        Ok(self)
    }

    pub fn with_markdown_extensions(mut self, extensions: Vec<MarkdownExtension>) -> Self {
        self.markdown_extensions = extensions;
        self
    }

    /// Parse extension names, rejecting unknown ones.
    pub fn with_markdown_extension_names<I, S>(self, names: I) -> Result<Self, BackendConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = parse_extensions(names)?;
        Ok(self.with_markdown_extensions(extensions))
    }

    pub fn with_plain_text(mut self, options: PlainTextOptions) -> Self {
        self.plain_text = options;
        self
    }

    pub fn with_default_subject(mut self, subject: impl Into<String>) -> Self {
        self.default_subject = Some(subject.into());
        self
    }

    pub fn with_default_preheader(mut self, preheader: impl Into<String>) -> Self {
        self.default_preheader = Some(preheader.into());
        self
    }

    pub fn with_fail_silently(mut self, fail_silently: bool) -> Self {
        self.fail_silently = fail_silently;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, BackendConfigError> {
        let parsed = Url::parse(base_url).map_err(|err| BackendConfigError::InvalidBaseUrl {
            value: base_url.to_string(),
            message: err.to_string(),
        })?;
        self.base_url = Some(parsed);
        Ok(self)
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }
}

pub fn parse_extensions<I, S>(names: I) -> Result<Vec<MarkdownExtension>, BackendConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut extensions = Vec::new();
    for name in names {
        let extension = name.as_ref().parse::<MarkdownExtension>().map_err(|err| {
            BackendConfigError::UnknownExtension { name: err.0 }
        })?;
        if !extensions.contains(&extension) {
            extensions.push(extension);
        }
    }
    Ok(extensions)
}

impl From<&crate::config::Settings> for BackendConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let templates = &settings.templates;
        let email = &settings.email;
        Self {
            template_prefix: templates.prefix.clone(),
            template_suffix: templates.file_extension.clone(),
            base_html_template: templates.base_html_template.clone(),
            markdown_extensions: email.markdown_extensions.clone(),
            plain_text: email.plain_text.clone(),
            default_subject: email.default_subject.clone(),
            default_preheader: email.default_preheader.clone(),
            fail_silently: email.fail_silently,
            base_url: email.base_url.clone(),
            fallback_message: email.fallback_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BackendConfig::default();
        assert_eq!(config.template_prefix, "templated_email/");
        assert_eq!(config.template_suffix, "md");
        assert_eq!(
            config.base_html_template,
            "templated_email/markdown_base.html"
        );
        assert_eq!(
            config.markdown_extensions,
            vec![
                MarkdownExtension::Meta,
                MarkdownExtension::Tables,
                MarkdownExtension::Extra,
            ]
        );
        assert!(!config.fail_silently);
        assert!(config.default_subject.is_none());
    }

    #[test]
    fn unknown_extensions_fail_at_configuration_time() {
        let err = BackendConfig::default()
            .with_markdown_extension_names(["tables", "wikilinks"])
            .unwrap_err();
        assert_eq!(
            err,
            BackendConfigError::UnknownExtension {
                name: "wikilinks".to_string()
            }
        );
    }

    #[test]
    fn duplicate_extensions_collapse() {
        let extensions = parse_extensions(["tables", "TABLES", "meta"]).expect("parses");
        assert_eq!(
            extensions,
            vec![MarkdownExtension::Tables, MarkdownExtension::Meta]
        );
    }

    #[test]
    fn suffix_loses_leading_dot() {
        let config = BackendConfig::default()
            .with_template_suffix(".txt")
            .expect("valid suffix");
        assert_eq!(config.template_suffix, "txt");
        assert!(BackendConfig::default().with_template_suffix(".").is_err());
    }

    #[test]
    fn base_url_must_be_absolute() {
        assert!(BackendConfig::default().with_base_url("/relative").is_err());
        let config = BackendConfig::default()
            .with_base_url("https://example.com/")
            .expect("valid url");
        assert_eq!(
            config.base_url.map(|url| url.to_string()),
            Some("https://example.com/".to_string())
        );
    }
}
