//! Filesystem discovery of email templates.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::error::InfraError;

/// A template file found under one of the template directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTemplate {
    /// Loader name: path relative to `root`, `/`-separated.
    pub name: String,
    pub root: PathBuf,
    pub path: PathBuf,
}

/// Walk `directories` in order and collect files ending in `.html` or
/// `.{extension}`; every file when `include_all` is set.
pub fn discover_templates(
    directories: &[PathBuf],
    extension: &str,
    include_all: bool,
) -> Result<Vec<DiscoveredTemplate>, InfraError> {
    let extension = extension.trim_start_matches('.');
    let mut templates = Vec::new();

    for root in directories {
        if !root.is_dir() {
            debug!(
                target = "infra::templates",
                directory = %root.display(),
                "template directory missing, skipping"
            );
            continue;
        }

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        target = "infra::templates",
                        directory = %root.display(),
                        error = %err,
                        "skipping unreadable template path"
                    );
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if !include_all && !has_template_extension(entry.path(), extension) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|err| {
                InfraError::template_discovery(format!(
                    "failed to strip prefix {}: {err}",
                    root.display()
                ))
            })?;

            templates.push(DiscoveredTemplate {
                name: loader_name(relative),
                root: root.clone(),
                path: entry.path().to_path_buf(),
            });
        }
    }

    Ok(templates)
}

fn has_template_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "html" || ext == extension)
}

fn loader_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, "x").expect("write file");
    }

    #[test]
    fn lists_html_and_configured_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        touch(dir.path(), "templated_email/welcome.md");
        touch(dir.path(), "templated_email/markdown_base.html");
        touch(dir.path(), "templated_email/notes.txt");

        let found = discover_templates(&[dir.path().to_path_buf()], "md", false).expect("walks");
        let names: Vec<_> = found.iter().map(|template| template.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "templated_email/markdown_base.html",
                "templated_email/welcome.md"
            ]
        );
    }

    #[test]
    fn include_all_lists_every_file_and_missing_dirs_are_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        touch(dir.path(), "a.txt");
        let missing = dir.path().join("missing");

        let found = discover_templates(&[missing, dir.path().to_path_buf()], ".md", true)
            .expect("walks");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a.txt");
    }
}
