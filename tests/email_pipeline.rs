use std::{path::PathBuf, sync::Arc, thread};

use serde_json::{Value, json};
use templated_email_md::application::{
    render::{
        BackendConfig, EmailRenderer, EmailRequest, MarkdownTemplateBackend, RenderContext,
        RenderStage, TemplateName,
    },
    templates::JinjaTemplateEngine,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/templates")
}

fn backend(config: BackendConfig) -> MarkdownTemplateBackend {
    let engine = JinjaTemplateEngine::new(vec![fixtures_dir()]);
    MarkdownTemplateBackend::new(config, Arc::new(engine))
}

fn context(value: Value) -> RenderContext {
    match value {
        Value::Object(map) => map,
        other => panic!("context must be an object, got {other}"),
    }
}

#[test]
fn renders_blocks_layout_and_plain_text() {
    let backend = backend(BackendConfig::default());
    let email = backend
        .render_email("test_message", &context(json!({ "name": "Ada" })), None, None)
        .expect("render succeeds");

    assert_eq!(email.subject, "My subject for Ada");
    assert_eq!(email.preheader.as_deref(), Some("Quick summary for Ada"));

    assert!(email.html.contains("<title>My subject for Ada</title>"));
    assert!(email.html.contains("Hello Ada!"));
    assert!(email.html.contains("<strong style="));
    assert!(email.html.contains(">bold</strong>"));
    assert!(email.html.contains("<h1 style="));
    assert!(email.html.contains("Quick summary for Ada</span>"));
    assert!(!email.html.contains("/* Layout */"));

    assert!(email.plain.contains("Welcome"));
    assert!(email.plain.contains("Hello Ada!"));
    assert!(email.plain.contains("bold"));
    assert!(email.plain.contains("https://example.com"));
    assert!(!email.plain.contains('*'));
    assert!(!email.plain.contains('`'));
    assert!(!email.plain.contains('<'));
    assert!(!email.plain.contains("My subject"));
    assert!(!email.plain.contains("Quick summary"));
}

#[test]
fn template_without_content_block_uses_remaining_body() {
    let backend = backend(BackendConfig::default());
    let email = backend
        .render_email("legacy", &context(json!({ "name": "Ada" })), None, None)
        .expect("render succeeds");

    assert_eq!(email.subject, "Legacy subject");
    assert!(email.html.contains("Ada</strong>"));
    assert!(email.plain.contains("this template has no content block"));
    assert!(!email.plain.contains("Legacy subject"));
}

#[test]
fn tables_follow_the_extension_set() {
    let with_tables = backend(BackendConfig::default())
        .render_email("report", &RenderContext::new(), None, None)
        .expect("render succeeds");
    assert!(with_tables.html.contains("<table"));
    assert!(with_tables.plain.contains("Ada"));

    let without_tables = backend(BackendConfig::default().with_markdown_extensions(Vec::new()))
        .render_email("report", &RenderContext::new(), None, None)
        .expect("render succeeds");
    assert!(!without_tables.html.contains("<table"));
    assert!(without_tables.html.contains("| Name | Score |"));
}

#[test]
fn context_values_override_template_blocks() {
    let backend = backend(BackendConfig::default());
    let ctx = context(json!({
        "name": "Ada",
        "subject": "Override subject",
        "preheader": "Override preheader",
    }));
    let before = ctx.clone();

    let email = backend
        .render_email("test_message", &ctx, None, None)
        .expect("render succeeds");

    assert_eq!(email.subject, "Override subject");
    assert_eq!(email.preheader.as_deref(), Some("Override preheader"));
    assert!(email.html.contains("<title>Override subject</title>"));
    assert_eq!(ctx, before);
}

#[test]
fn missing_subject_falls_back_to_defaults() {
    let email = backend(BackendConfig::default())
        .render_email("no_subject", &context(json!({ "name": "Ada" })), None, None)
        .expect("render succeeds");
    assert_eq!(email.subject, "No Subject");
    assert_eq!(email.preheader, None);
    assert!(email.plain.contains("Just a body for Ada."));

    let configured = BackendConfig::default()
        .with_default_subject("Hello from us")
        .with_default_preheader("Default preheader");
    let email = backend(configured)
        .render_email("no_subject", &context(json!({ "name": "Ada" })), None, None)
        .expect("render succeeds");
    assert_eq!(email.subject, "Hello from us");
    assert_eq!(email.preheader.as_deref(), Some("Default preheader"));
}

#[test]
fn candidate_lists_use_the_first_existing_template() {
    let backend = backend(BackendConfig::default());
    let email = backend
        .render_email(
            TemplateName::from(&["does_not_exist", "test_message"][..]),
            &context(json!({ "name": "Ada" })),
            None,
            None,
        )
        .expect("render succeeds");
    assert_eq!(email.subject, "My subject for Ada");
}

#[test]
fn missing_template_errors_unless_failing_silently() {
    let err = backend(BackendConfig::default())
        .render_email("does_not_exist", &RenderContext::new(), None, None)
        .expect_err("missing template fails");
    assert_eq!(err.stage(), RenderStage::ResolveTemplate);

    let email = backend(BackendConfig::default().with_fail_silently(true))
        .render_email("does_not_exist", &RenderContext::new(), None, None)
        .expect("fallback email");
    assert_eq!(email.html, "This email could not be rendered.");
    assert_eq!(email.plain, "This email could not be rendered.");
    assert_eq!(email.subject, "No Subject");
}

#[test]
fn comments_are_stripped_but_conditional_comments_survive() {
    let email = backend(BackendConfig::default())
        .render_email("comments", &RenderContext::new(), None, None)
        .expect("render succeeds");

    assert!(!email.html.contains("internal note"));
    assert!(email.html.contains("<!--[if mso]>"));
    assert!(email.plain.contains("Visible paragraph."));
    assert!(!email.plain.contains("internal note"));
}

#[test]
fn base_url_absolutizes_relative_links_in_html() {
    let config = BackendConfig::default()
        .with_base_url("https://example.com/app/")
        .expect("valid base url");
    let email = backend(config)
        .render_email("links", &RenderContext::new(), None, None)
        .expect("render succeeds");

    assert!(email.html.contains("href=\"https://example.com/changelog\""));
    assert!(email.html.contains("src=\"https://example.com/static/logo.png\""));
    assert!(email.html.contains("href=\"mailto:team@example.com\""));
    assert!(email.plain.contains("[Logo]"));
}

#[test]
fn renderer_trait_honours_per_request_prefix() {
    let backend = backend(BackendConfig::default());
    let request = EmailRequest::new("inner", context(json!({ "name": "Ada" })))
        .with_template_dir("templated_email/nested/");

    let email = EmailRenderer::render(&backend, &request).expect("render succeeds");
    assert!(email.plain.contains("Nested template for Ada."));
    assert_eq!(email.subject, "No Subject");
}

#[test]
fn backend_is_shareable_across_threads() {
    let backend = Arc::new(backend(BackendConfig::default()));

    let handles: Vec<_> = ["Ada", "Grace", "Linus", "Barbara"]
        .into_iter()
        .map(|name| {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                let email = backend
                    .render_email("test_message", &context(json!({ "name": name })), None, None)
                    .expect("render succeeds");
                (name, email)
            })
        })
        .collect();

    for handle in handles {
        let (name, email) = handle.join().expect("thread completes");
        assert_eq!(email.subject, format!("My subject for {name}"));
        assert!(email.plain.contains(&format!("Hello {name}!")));
    }
}

#[test]
fn context_values_cannot_inject_markup() {
    let backend = backend(BackendConfig::default());
    let email = backend
        .render_email(
            "test_message",
            &context(json!({ "name": "<img src=x onerror=alert(1)>" })),
            None,
            None,
        )
        .expect("render succeeds");

    assert!(!email.html.contains("<img src=x"));
    assert!(email.html.contains("Hello &lt;img src=x onerror=alert(1)&gt;!"));
    assert_eq!(email.subject, "My subject for <img src=x onerror=alert(1)>");
    assert!(email.plain.contains("Hello <img src=x onerror=alert(1)>!"));
}

#[test]
fn escaped_characters_in_subjects_are_decoded_once() {
    let email = backend(BackendConfig::default())
        .render_email("test_message", &context(json!({ "name": "Tom & Jerry" })), None, None)
        .expect("render succeeds");

    assert_eq!(email.subject, "My subject for Tom & Jerry");
    assert_eq!(email.preheader.as_deref(), Some("Quick summary for Tom & Jerry"));
    assert!(email.html.contains("<title>My subject for Tom &amp; Jerry</title>"));
}

#[test]
fn duplicate_blocks_are_rejected_when_the_template_loads() {
    let err = backend(BackendConfig::default())
        .render_email("duplicate_subject", &RenderContext::new(), None, None)
        .expect_err("duplicate blocks do not compile");
    assert_eq!(err.stage(), RenderStage::ResolveTemplate);

    let email = backend(BackendConfig::default().with_fail_silently(true))
        .render_email("duplicate_subject", &RenderContext::new(), None, None)
        .expect("fallback email");
    assert_eq!(email.html, "This email could not be rendered.");
    assert!(!email.html.contains("First subject"));
}
