use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the templated-email-md binary.
#[derive(Debug, Parser)]
#[command(
    name = "templated-email-md",
    version,
    about = "Render multipart emails from Markdown templates"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TEMPLATED_EMAIL_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render one email and print it as JSON.
    Render(Box<RenderArgs>),
    /// List the templates found in the configured template directories.
    #[command(name = "templates")]
    ListTemplates(ListTemplatesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Replace the configured template directories; repeat for several.
    #[arg(
        long = "template-dir",
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub template_dirs: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("context_source").args(["context", "context_file"])))]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Template name; further names are tried in order when the first is missing.
    #[arg(value_name = "NAME", required = true)]
    pub template: Vec<String>,

    /// Render context as a JSON object.
    #[arg(long = "context", value_name = "JSON")]
    pub context: Option<String>,

    /// File holding the render context as a JSON object.
    #[arg(long = "context-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub context_file: Option<PathBuf>,

    /// Template prefix for this render only.
    #[arg(long = "template-prefix", value_name = "PREFIX")]
    pub template_prefix: Option<String>,

    /// Template file extension for this render only.
    #[arg(long = "file-extension", value_name = "EXT")]
    pub file_extension: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the base HTML layout template.
    #[arg(long = "base-html-template", value_name = "NAME")]
    pub base_html_template: Option<String>,

    /// Replace the enabled Markdown extensions; repeat for several.
    #[arg(long = "markdown-extension", value_name = "NAME")]
    pub markdown_extensions: Vec<String>,

    /// Override the default subject.
    #[arg(long = "default-subject", value_name = "TEXT")]
    pub default_subject: Option<String>,

    /// Override the default preheader.
    #[arg(long = "default-preheader", value_name = "TEXT")]
    pub default_preheader: Option<String>,

    /// Return the fallback email instead of failing.
    #[arg(
        long = "fail-silently",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub fail_silently: Option<bool>,

    /// Resolve relative links in the HTML against this URL.
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListTemplatesArgs {
    /// Also list files that are neither `.html` nor the configured extension.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all: bool,
}
