use std::{cell::Cell, rc::Rc};

use html2text::render::RichAnnotation;
use lol_html::{
    RewriteStrSettings, element,
    html_content::{ContentType, Element},
    rewrite_str,
};
use serde::{Deserialize, Serialize};

use crate::application::render::types::{EmailError, RenderStage};

/// Width handed to `html2text` when wrapping is disabled.
const UNWRAPPED_WIDTH: usize = 10_000;

/// Feature toggles for the plain-text alternative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlainTextOptions {
    /// Drop link targets, keeping only the link text.
    pub ignore_links: bool,
    /// Drop image alt text.
    pub ignore_images: bool,
    /// Hard wrap column; `0` disables wrapping.
    pub body_width: usize,
    /// Render bold and italic text without `**` / `_` markers.
    pub ignore_emphasis: bool,
    /// Surround code spans with backticks.
    pub mark_code: bool,
    /// Write links as `[text][n]` references listed after the body
    /// instead of inline `text (url)`.
    pub wrap_links: bool,
}

impl Default for PlainTextOptions {
    fn default() -> Self {
        Self {
            ignore_links: false,
            ignore_images: false,
            body_width: 0,
            ignore_emphasis: true,
            mark_code: false,
            wrap_links: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PlainTextGenerator {
    options: PlainTextOptions,
}

impl PlainTextGenerator {
    pub(crate) fn new(options: PlainTextOptions) -> Self {
        Self { options }
    }

    /// Render an HTML fragment as readable text.
    pub(crate) fn generate(&self, html: &str) -> Result<String, EmailError> {
        let width = match self.options.body_width {
            0 => UNWRAPPED_WIDTH,
            width => width,
        };

        let prepared = prepare(html, &self.options)?;
        let lines = html2text::config::rich()
            .lines_from_read(prepared.as_bytes(), width)
            .map_err(|err| EmailError::render(RenderStage::GeneratePlainText, err.to_string()))?;

        let mut writer = TextWriter::new(&self.options);
        for line in &lines {
            for segment in line.tagged_strings() {
                writer.push_segment(&segment.s, &segment.tag);
            }
            writer.end_line();
        }
        Ok(writer.finish())
    }
}

/// Unwrap inline formatting elements, writing the configured text markers
/// in their place. `html2text` never sees `strong`, `em` or `code`.
fn prepare(html: &str, options: &PlainTextOptions) -> Result<String, EmailError> {
    let emphasis = !options.ignore_emphasis;
    let mark_code = options.mark_code;
    let in_block = Rc::new(Cell::new(false));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("strong, b", move |el| {
                    unwrap_element(el, emphasis.then_some("**"));
                    Ok(())
                }),
                element!("em, i", move |el| {
                    unwrap_element(el, emphasis.then_some("_"));
                    Ok(())
                }),
                // Runs before the `code` handler for the same element.
                element!("pre code", {
                    let in_block = Rc::clone(&in_block);
                    move |el| {
                        in_block.set(true);
                        unwrap_element(el, None);
                        Ok(())
                    }
                }),
                element!("code", {
                    let in_block = Rc::clone(&in_block);
                    move |el| {
                        let block = in_block.replace(false);
                        unwrap_element(el, (mark_code && !block).then_some("`"));
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| EmailError::render(RenderStage::GeneratePlainText, err.to_string()))
}

fn unwrap_element(el: &mut Element<'_, '_>, marker: Option<&str>) {
    if let Some(marker) = marker {
        el.before(marker, ContentType::Text);
        el.after(marker, ContentType::Text);
    }
    el.remove_and_keep_content();
}

/// Link whose closing text is still to be written.
struct OpenLink {
    url: String,
    text: String,
    /// Finished line holding the last text of the link; `None` while that
    /// text is on the current line.
    last_line: Option<usize>,
}

struct TextWriter<'a> {
    options: &'a PlainTextOptions,
    lines: Vec<String>,
    current: String,
    link: Option<OpenLink>,
    references: Vec<String>,
}

impl<'a> TextWriter<'a> {
    fn new(options: &'a PlainTextOptions) -> Self {
        Self {
            options,
            lines: Vec::new(),
            current: String::new(),
            link: None,
            references: Vec::new(),
        }
    }

    fn push_segment(&mut self, text: &str, annotations: &[RichAnnotation]) {
        let mut url = None;
        let mut image = false;
        for annotation in annotations {
            match annotation {
                RichAnnotation::Link(target) => url = Some(target.as_str()),
                RichAnnotation::Image(_) => image = true,
                _ => {}
            }
        }

        if self.link.as_ref().map(|link| link.url.as_str()) != url {
            self.close_link();
            if let Some(url) = url {
                self.open_link(url);
            }
        }

        if image {
            if !self.options.ignore_images && !text.trim().is_empty() {
                self.push_text(&format!("[{}]", text.trim()));
            }
        } else {
            self.push_text(text);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(link) = self.link.as_mut() {
            link.text.push_str(text);
            link.last_line = None;
        }
        self.current.push_str(text);
    }

    /// Links stay open across line ends; a wrapped link is still one link.
    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.lines.push(line.trim_end().to_string());

        let finished = self.lines.len() - 1;
        if let Some(link) = self.link.as_mut() {
            link.last_line.get_or_insert(finished);
            link.text.push(' ');
        }
    }

    fn open_link(&mut self, url: &str) {
        if !self.options.ignore_links && self.options.wrap_links {
            self.current.push('[');
        }
        self.link = Some(OpenLink {
            url: url.to_string(),
            text: String::new(),
            last_line: None,
        });
    }

    fn close_link(&mut self) {
        let Some(OpenLink {
            url,
            text,
            last_line,
        }) = self.link.take()
        else {
            return;
        };
        if self.options.ignore_links {
            return;
        }

        let suffix = if self.options.wrap_links {
            self.references.push(url);
            format!("][{}]", self.references.len())
        } else {
            let text = text.trim();
            if text.is_empty() {
                url
            } else if text == url || url.strip_prefix("mailto:") == Some(text) {
                String::new()
            } else {
                format!(" ({url})")
            }
        };

        match last_line.and_then(|index| self.lines.get_mut(index)) {
            Some(line) => line.push_str(&suffix),
            None => self.current.push_str(&suffix),
        }
    }

    fn finish(mut self) -> String {
        self.close_link();
        if !self.current.is_empty() {
            self.end_line();
        }

        let mut body = self.lines.join("\n").trim_matches('\n').to_string();

        if !self.references.is_empty() {
            body.push_str("\n\n");
            let references: Vec<_> = self
                .references
                .iter()
                .enumerate()
                .map(|(index, url)| format!("[{}]: {url}", index + 1))
                .collect();
            body.push_str(&references.join("\n"));
        }

        body
    }
}
