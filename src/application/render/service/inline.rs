use css_inline::CSSInliner;
use lol_html::{
    HandlerResult, RewriteStrSettings, element, html_content::Element, rewrite_str,
};
use tracing::warn;
use url::Url;

use crate::application::render::types::EmailError;

/// Copies `<style>` rules onto matching elements as `style` attributes.
///
/// The `<style>` blocks stay in the document so rules that cannot be
/// inlined (`:hover`, media queries) still reach clients that honour them.
/// Remote stylesheets are never fetched.
#[derive(Debug, Clone, Default)]
pub(crate) struct CssInliner {
    base_url: Option<Url>,
}

impl CssInliner {
    pub(crate) fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    pub(crate) fn inline(&self, html: &str, fail_silently: bool) -> Result<String, EmailError> {
        match self.try_inline(html) {
            Ok(inlined) => Ok(inlined),
            Err(err) if fail_silently => {
                warn!(
                    target = "application::render::inline_css",
                    error = %err,
                    "css inlining failed, returning html unchanged"
                );
                Ok(html.to_string())
            }
            Err(err) => Err(err),
        }
    }

    fn try_inline(&self, html: &str) -> Result<String, EmailError> {
        let html = match &self.base_url {
            Some(base) => absolutize_links(html, base)?,
            None => html.to_string(),
        };

        CSSInliner::options()
            .keep_style_tags(true)
            .load_remote_stylesheets(false)
            .base_url(self.base_url.clone())
            .build()
            .inline(&html)
            .map_err(|err| EmailError::css_inlining(err.to_string()))
    }
}

/// Resolve relative `href` and `src` values against `base`. Fragments and
/// unrendered template expressions are left alone.
fn absolutize_links(html: &str, base: &Url) -> Result<String, EmailError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("[href]", move |el| absolutize(el, "href", base)),
                element!("[src]", move |el| absolutize(el, "src", base)),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| EmailError::css_inlining(err.to_string()))
}

fn absolutize(el: &mut Element<'_, '_>, attribute: &str, base: &Url) -> HandlerResult {
    let Some(value) = el.get_attribute(attribute) else {
        return Ok(());
    };
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("{{") {
        return Ok(());
    }

    match Url::parse(trimmed) {
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = base.join(trimmed)?;
            el.set_attribute(attribute, joined.as_str())?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}
