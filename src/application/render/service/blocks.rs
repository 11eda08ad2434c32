use std::{borrow::Cow, ops::Range};

use tracing::debug;

use crate::application::{
    render::types::{BlockSet, EmailError, RenderContext, RenderStage},
    templates::{ResolvedTemplate, TemplateEngine, unescape_html},
};

const SUBJECT_BLOCK: &str = "subject";
const PREHEADER_BLOCK: &str = "preheader";
const CONTENT_BLOCK: &str = "content";

/// Isolates the `subject`, `preheader` and `content` blocks of an email
/// template.
pub(crate) struct BlockExtractor<'a> {
    engine: &'a dyn TemplateEngine,
}

impl<'a> BlockExtractor<'a> {
    pub(crate) fn new(engine: &'a dyn TemplateEngine) -> Self {
        Self { engine }
    }

    pub(crate) fn extract(
        &self,
        template: &ResolvedTemplate,
        context: &RenderContext,
    ) -> Result<BlockSet, EmailError> {
        let subject = self.text_block(template, SUBJECT_BLOCK, context)?;
        let preheader = self.text_block(template, PREHEADER_BLOCK, context)?;

        let content = match self.block(template, CONTENT_BLOCK, context)? {
            Some(content) => content,
            None => {
                debug!(
                    target = "application::render::extract_blocks",
                    template = %template.name,
                    "no content block, rendering template without header blocks"
                );
                let body = strip_blocks(&template.source, &[SUBJECT_BLOCK, PREHEADER_BLOCK]);
                self.engine
                    .render_str(&body, context)
                    .map_err(|err| EmailError::template(RenderStage::ExtractBlocks, &err))?
            }
        };

        Ok(BlockSet {
            subject,
            preheader,
            content,
        })
    }

    /// Subject and preheader are plain text, so escaped `{{ }}` output is decoded.
    fn text_block(
        &self,
        template: &ResolvedTemplate,
        block: &str,
        context: &RenderContext,
    ) -> Result<Option<String>, EmailError> {
        Ok(self
            .block(template, block, context)?
            .map(|text| unescape_html(&text).into_owned()))
    }

    fn block(
        &self,
        template: &ResolvedTemplate,
        block: &str,
        context: &RenderContext,
    ) -> Result<Option<String>, EmailError> {
        self.engine
            .render_block(&template.name, block, context)
            .map_err(|err| EmailError::template(RenderStage::ExtractBlocks, &err))
    }
}

/// Remove the first occurrence of each named block from raw template source.
pub(crate) fn strip_blocks<'s>(source: &'s str, names: &[&str]) -> Cow<'s, str> {
    let mut stripped = Cow::Borrowed(source);
    for name in names {
        if let Some(range) = find_block(&stripped, name) {
            let mut owned = stripped.into_owned();
            owned.replace_range(range, "");
            stripped = Cow::Owned(owned);
        }
    }
    stripped
}

/// Byte range of `{% block name %}…{% endblock %}`, including both tags.
fn find_block(source: &str, name: &str) -> Option<Range<usize>> {
    let mut tags = TagScanner::new(source);
    let open = tags.find(|tag| block_name(tag.body) == Some(name))?;

    let mut depth = 1usize;
    for tag in tags {
        if block_name(tag.body).is_some() {
            depth += 1;
        } else if is_endblock(tag.body) {
            depth -= 1;
            if depth == 0 {
                return Some(open.span.start..tag.span.end);
            }
        }
    }
    None
}

fn block_name(body: &str) -> Option<&str> {
    let mut words = body.split_whitespace();
    match (words.next(), words.next()) {
        (Some("block"), Some(name)) => Some(name),
        _ => None,
    }
}

fn is_endblock(body: &str) -> bool {
    body.split_whitespace().next() == Some("endblock")
}

struct Tag<'s> {
    span: Range<usize>,
    /// Tag contents without delimiters and whitespace-control markers.
    body: &'s str,
}

/// Iterates `{% … %}` statement tags, skipping `{# … #}` comments.
struct TagScanner<'s> {
    source: &'s str,
    position: usize,
}

impl<'s> TagScanner<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            position: 0,
        }
    }
}

impl<'s> Iterator for TagScanner<'s> {
    type Item = Tag<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = &self.source[self.position..];
            let offset = rest.find('{')?;
            let start = self.position + offset;
            let after = &self.source[start..];

            if after.starts_with("{#") {
                self.position = match after.find("#}") {
                    Some(end) => start + end + 2,
                    None => self.source.len(),
                };
                continue;
            }

            if !after.starts_with("{%") {
                self.position = start + 1;
                continue;
            }

            let close = after.find("%}")?;
            let end = start + close + 2;
            let body = self.source[start + 2..start + close]
                .trim_matches(|c: char| c == '-' || c == '+' || c.is_whitespace());
            self.position = end;
            return Some(Tag {
                span: start..end,
                body,
            });
        }
    }
}
