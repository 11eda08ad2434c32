use std::{fmt, str::FromStr};

use comrak::{Arena, format_html, options::Options, parse_document};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::render::types::EmailError;

/// Markdown features that can be switched on for email content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownExtension {
    /// `---` delimited metadata header, stripped from the output.
    Meta,
    Tables,
    Footnotes,
    DefList,
    /// Fenced code is part of CommonMark; accepted for completeness.
    FencedCode,
    /// Tables, footnotes, definition lists and fenced code.
    Extra,
    Strikethrough,
    Autolink,
    Tasklist,
    /// Accepted for compatibility; list handling is always CommonMark.
    SaneLists,
}

impl MarkdownExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkdownExtension::Meta => "meta",
            MarkdownExtension::Tables => "tables",
            MarkdownExtension::Footnotes => "footnotes",
            MarkdownExtension::DefList => "def_list",
            MarkdownExtension::FencedCode => "fenced_code",
            MarkdownExtension::Extra => "extra",
            MarkdownExtension::Strikethrough => "strikethrough",
            MarkdownExtension::Autolink => "autolink",
            MarkdownExtension::Tasklist => "tasklist",
            MarkdownExtension::SaneLists => "sane_lists",
        }
    }

    /// Extensions enabled when the configuration does not name any.
    pub fn defaults() -> Vec<MarkdownExtension> {
        vec![
            MarkdownExtension::Meta,
            MarkdownExtension::Tables,
            MarkdownExtension::Extra,
        ]
    }
}

impl fmt::Display for MarkdownExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown markdown extension `{0}`")]
pub struct UnknownExtension(pub String);

impl FromStr for MarkdownExtension {
    type Err = UnknownExtension;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let extension = match normalized.as_str() {
            "meta" => MarkdownExtension::Meta,
            "tables" | "table" => MarkdownExtension::Tables,
            "footnotes" => MarkdownExtension::Footnotes,
            "def_list" | "definition_lists" => MarkdownExtension::DefList,
            "fenced_code" => MarkdownExtension::FencedCode,
            "extra" => MarkdownExtension::Extra,
            "strikethrough" => MarkdownExtension::Strikethrough,
            "autolink" => MarkdownExtension::Autolink,
            "tasklist" => MarkdownExtension::Tasklist,
            "sane_lists" => MarkdownExtension::SaneLists,
            _ => return Err(UnknownExtension(value.to_string())),
        };
        Ok(extension)
    }
}

/// Converts email content from Markdown to HTML with a fixed extension set.
pub struct MarkdownConverter {
    options: Options<'static>,
    extensions: Vec<MarkdownExtension>,
}

impl MarkdownConverter {
    pub fn new(extensions: &[MarkdownExtension]) -> Self {
        Self {
            options: build_options(extensions),
            extensions: extensions.to_vec(),
        }
    }

    pub fn extensions(&self) -> &[MarkdownExtension] {
        &self.extensions
    }

    /// Convert `markdown` into an HTML fragment.
    ///
    /// With `fail_silently` a conversion failure hands back the unconverted
    /// text so later stages still receive a string.
    pub fn render(&self, markdown: &str, fail_silently: bool) -> Result<String, EmailError> {
        match self.try_render(markdown) {
            Ok(html) => Ok(html),
            Err(err) if fail_silently => {
                warn!(
                    target = "application::render::markdown",
                    error = %err,
                    "markdown conversion failed, passing source through"
                );
                Ok(markdown.to_string())
            }
            Err(err) => Err(err),
        }
    }

    fn try_render(&self, markdown: &str) -> Result<String, EmailError> {
        let markdown = if self.extensions.contains(&MarkdownExtension::Meta) {
            strip_meta_lines(markdown)
        } else {
            markdown
        };

        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| EmailError::markdown(err.to_string()))?;
        Ok(html)
    }
}

/// Drop a bare `Key: value` header at the very start of the document.
///
/// Continuation lines are indented four spaces; the header ends at the first
/// blank line or the first line that is neither. `---` fenced headers are
/// left to comrak's front matter support.
fn strip_meta_lines(markdown: &str) -> &str {
    let mut rest = markdown;
    let mut in_header = false;

    while !rest.is_empty() {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() {
            return if in_header { tail } else { markdown };
        }
        if !is_meta_key_line(line) && !(in_header && line.starts_with("    ")) {
            break;
        }
        in_header = true;
        rest = tail;
    }

    if in_header { rest } else { markdown }
}

fn is_meta_key_line(line: &str) -> bool {
    let stripped = line.trim_start_matches(' ');
    if line.len() - stripped.len() > 3 {
        return false;
    }
    stripped.split_once(':').is_some_and(|(key, _)| {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

fn build_options(extensions: &[MarkdownExtension]) -> Options<'static> {
    let mut options = Options::default();

    let render = &mut options.render;
    // Templates may embed raw HTML (buttons, spacer tables) next to Markdown.
    render.r#unsafe = true;

    let ext = &mut options.extension;
    for extension in extensions {
        match extension {
            MarkdownExtension::Meta => {
                ext.front_matter_delimiter = Some("---".to_string());
            }
            MarkdownExtension::Tables => ext.table = true,
            MarkdownExtension::Footnotes => ext.footnotes = true,
            MarkdownExtension::DefList => ext.description_lists = true,
            MarkdownExtension::Extra => {
                ext.table = true;
                ext.footnotes = true;
                ext.description_lists = true;
            }
            MarkdownExtension::Strikethrough => ext.strikethrough = true,
            MarkdownExtension::Autolink => ext.autolink = true,
            MarkdownExtension::Tasklist => ext.tasklist = true,
            MarkdownExtension::FencedCode | MarkdownExtension::SaneLists => {}
        }
    }

    options
}
