use std::io::Write;

use super::*;

#[test]
fn defaults_are_applied() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.templates.directories,
        vec![PathBuf::from("templates")]
    );
    assert_eq!(settings.templates.prefix, "templated_email/");
    assert_eq!(settings.templates.file_extension, "md");
    assert_eq!(
        settings.templates.base_html_template,
        "templated_email/markdown_base.html"
    );
    assert_eq!(
        settings.email.markdown_extensions,
        MarkdownExtension::defaults()
    );
    assert!(!settings.email.fail_silently);
    assert!(settings.email.default_subject.is_none());
    assert_eq!(settings.email.plain_text, PlainTextOptions::default());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.email.fail_silently = Some(false);
    raw.email.markdown_extensions = Some(vec!["meta".to_string()]);

    raw.apply_global_overrides(&GlobalOverrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        template_dirs: vec![PathBuf::from("/srv/mail")],
    });
    raw.apply_render_overrides(&RenderOverrides {
        fail_silently: Some(true),
        markdown_extensions: vec!["tables".to_string()],
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(
        settings.templates.directories,
        vec![PathBuf::from("/srv/mail")]
    );
    assert!(settings.email.fail_silently);
    assert_eq!(
        settings.email.markdown_extensions,
        vec![MarkdownExtension::Tables]
    );
}

#[test]
fn unknown_markdown_extension_is_rejected() {
    let mut raw = RawSettings::default();
    raw.email.markdown_extensions = Some(vec!["tables".to_string(), "smarty".to_string()]);

    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "email.markdown_extensions",
            ..
        }
    ));
}

#[test]
fn invalid_base_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.email.base_url = Some("not a url".to_string());

    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "email.base_url",
            ..
        }
    ));
}

#[test]
fn file_extension_is_normalised() {
    let mut raw = RawSettings::default();
    raw.templates.file_extension = Some(".txt".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.templates.file_extension, "txt");

    let mut raw = RawSettings::default();
    raw.templates.file_extension = Some(".".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_defaults_are_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.email.default_subject = Some("   ".to_string());
    raw.email.fallback_message = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.email.default_subject.is_none());
    assert_eq!(settings.email.fallback_message, DEFAULT_FALLBACK_MESSAGE);
}

#[test]
fn config_file_is_layered_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[email]\ndefault_subject = \"From file\"\nfail_silently = true\n\n\
         [email.plain_text]\nbody_width = 72\n"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let args = CliArgs::parse_from([
        "templated-email-md",
        "--config-file",
        path.as_str(),
        "render",
        "welcome",
        "--fail-silently",
        "false",
    ]);

    let settings = load(&args).expect("loads");
    assert_eq!(settings.email.default_subject.as_deref(), Some("From file"));
    assert!(!settings.email.fail_silently);
    assert_eq!(settings.email.plain_text.body_width, 72);
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "templated-email-md",
        "render",
        "welcome",
        "welcome_fallback",
        "--context",
        "{\"name\": \"Ada\"}",
        "--markdown-extension",
        "tables",
        "--markdown-extension",
        "footnotes",
        "--log-level",
        "debug",
    ]);

    assert_eq!(args.overrides.log_level.as_deref(), Some("debug"));
    match args.command {
        Command::Render(render) => {
            assert_eq!(render.template, ["welcome", "welcome_fallback"]);
            assert_eq!(render.context.as_deref(), Some("{\"name\": \"Ada\"}"));
            assert_eq!(
                render.overrides.markdown_extensions,
                ["tables", "footnotes"]
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn context_sources_are_exclusive() {
    let result = CliArgs::try_parse_from([
        "templated-email-md",
        "render",
        "welcome",
        "--context",
        "{}",
        "--context-file",
        "ctx.json",
    ]);
    assert!(result.is_err());
}

#[test]
fn parse_templates_command() {
    let args = CliArgs::parse_from([
        "templated-email-md",
        "templates",
        "--template-dir",
        "/srv/a",
        "--template-dir",
        "/srv/b",
    ]);

    assert_eq!(
        args.overrides.template_dirs,
        vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
    );
    assert!(matches!(args.command, Command::ListTemplates(_)));
}
