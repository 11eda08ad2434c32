use std::{fs, process, sync::Arc};

use serde_json::Value;
use templated_email_md::{
    application::{
        error::AppError,
        render::{BackendConfig, MarkdownTemplateBackend, RenderContext, TemplateName},
        templates::{JinjaTemplateEngine, TemplateEngine},
    },
    config,
    infra::{error::InfraError, telemetry, templates::discover_templates},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?messages, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let engine = Arc::new(JinjaTemplateEngine::new(
        settings.templates.directories.clone(),
    ));

    match cli_args.command {
        config::Command::Render(args) => run_render(&settings, engine, *args),
        config::Command::ListTemplates(args) => {
            run_list_templates(&settings, engine.as_ref(), &args)
        }
    }
}

fn run_render(
    settings: &config::Settings,
    engine: Arc<JinjaTemplateEngine>,
    args: config::RenderArgs,
) -> Result<(), AppError> {
    let context = load_context(&args)?;
    let backend = MarkdownTemplateBackend::new(BackendConfig::from(settings), engine);

    let config::RenderArgs {
        mut template,
        template_prefix,
        file_extension,
        ..
    } = args;
    let template_name = if template.len() == 1 {
        TemplateName::Single(template.remove(0))
    } else {
        TemplateName::Candidates(template)
    };

    info!(template = %template_name, "rendering email");
    let email = backend.render_email(
        template_name,
        &context,
        template_prefix.as_deref(),
        file_extension.as_deref(),
    )?;

    let output = serde_json::to_string_pretty(&email)
        .map_err(|err| AppError::unexpected(format!("failed to serialise email: {err}")))?;
    println!("{output}");
    Ok(())
}

fn load_context(args: &config::RenderArgs) -> Result<RenderContext, AppError> {
    let raw = match (&args.context, &args.context_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path).map_err(InfraError::from)?,
        (None, None) => return Ok(RenderContext::new()),
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(context)) => Ok(context),
        Ok(_) => Err(AppError::validation("render context must be a JSON object")),
        Err(err) => Err(AppError::validation(format!(
            "render context is not valid JSON: {err}"
        ))),
    }
}

fn run_list_templates(
    settings: &config::Settings,
    engine: &dyn TemplateEngine,
    args: &config::ListTemplatesArgs,
) -> Result<(), AppError> {
    let templates = discover_templates(
        &settings.templates.directories,
        &settings.templates.file_extension,
        args.all,
    )?;

    let mut listed = 0usize;
    for template in &templates {
        if !args.all {
            match engine.source(&template.name) {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        template = %template.name,
                        path = %template.path.display(),
                        error = %err,
                        "template does not compile, skipping"
                    );
                    continue;
                }
            }
        }
        println!("{}", template.name);
        listed += 1;
    }

    info!(count = listed, "listed templates");
    Ok(())
}
