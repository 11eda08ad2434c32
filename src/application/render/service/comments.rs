use std::{cell::RefCell, rc::Rc};

use lol_html::{
    RewriteStrSettings, doc_comments, html_content::ContentType, rewrite_str, text,
};

use crate::application::render::types::{EmailError, RenderStage};

/// Remove HTML comments plus CSS and JS comments inside `<style>` and
/// `<script>`, keeping IE conditional comments verbatim.
pub(crate) fn strip_comments(html: &str) -> Result<String, EmailError> {
    let style_buffer = Rc::new(RefCell::new(String::new()));
    let script_buffer = Rc::new(RefCell::new(String::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                text!("style", {
                    let buffer = Rc::clone(&style_buffer);
                    move |chunk| {
                        buffer.borrow_mut().push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let css = std::mem::take(&mut *buffer.borrow_mut());
                            chunk.replace(&strip_css_comments(&css), ContentType::Html);
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }
                }),
                text!("script", {
                    let buffer = Rc::clone(&script_buffer);
                    move |chunk| {
                        buffer.borrow_mut().push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let js = std::mem::take(&mut *buffer.borrow_mut());
                            chunk.replace(&strip_js_comments(&js), ContentType::Html);
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }
                }),
            ],
            document_content_handlers: vec![doc_comments!(|comment| {
                if !is_conditional_comment(&comment.text()) {
                    comment.remove();
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| EmailError::render(RenderStage::StripComments, err.to_string()))
}

/// `<!--[if mso]>…<![endif]-->`, `<!--[if !mso]><!-->` and `<!--<![endif]-->`.
fn is_conditional_comment(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("[if") || text.starts_with("<![endif]")
}

fn strip_css_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
            }
            _ => out.push(c),
        }
    }

    out
}

fn strip_js_comments(js: &str) -> String {
    let mut out = String::with_capacity(js.len());
    let mut chars = js.chars().peekable();
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            previous = Some(c);
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                continue;
            }
            // `scheme://host` outside a string is never a comment start.
            '/' if chars.peek() == Some(&'/') && previous != Some(':') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            }
            _ => out.push(c),
        }
        previous = Some(c);
    }

    out
}

fn skip_block_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return;
        }
    }
}
