use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, ErrorKind};
use serde_json::Value as JsonValue;
use tracing::debug;

use mailroom_core::{MailError, Result};

/// Renders HTML templates from one directory. File templates always
/// autoescape context values; inline subject/body strings do not.
pub struct TemplateRenderer {
    dir: PathBuf,
    files: Environment<'static>,
    inline: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut files = Environment::new();
        files.set_loader(minijinja::path_loader(dir.clone()));
        files.set_auto_escape_callback(|_| AutoEscape::Html);
        Self {
            dir,
            files,
            inline: Environment::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Renders `name`, falling back to `name.html`.
    pub fn render(&self, name: &str, context: &JsonValue) -> Result<String> {
        let candidates = [name.to_string(), format!("{}.html", name)];
        for candidate in &candidates {
            match self.files.get_template(candidate) {
                Ok(template) => {
                    debug!(template = %candidate, dir = %self.dir.display(), "rendering template");
                    return template
                        .render(context)
                        .map_err(|e| render_error(candidate, &e));
                }
                Err(err) if matches!(err.kind(), ErrorKind::TemplateNotFound) => continue,
                Err(err) => return Err(render_error(candidate, &err)),
            }
        }
        Err(MailError::TemplateNotFound(name.to_string()))
    }

    /// Renders a subject or body string against the context.
    pub fn render_inline(&self, source: &str, context: &JsonValue) -> Result<String> {
        self.inline
            .render_str(source, context)
            .map_err(|e| render_error("<inline>", &e))
    }
}

fn render_error(name: &str, err: &minijinja::Error) -> MailError {
    MailError::Template {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

/// Parses a `--context` argument; it must be a JSON object.
pub fn parse_context(raw: &str) -> Result<JsonValue> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value @ JsonValue::Object(_)) => Ok(value),
        _ => Err(MailError::validation(format!("Invalid JSON context: {}", raw))),
    }
}
