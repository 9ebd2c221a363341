use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use tracing::debug;

use mailroom_content::TemplateRenderer;
use mailroom_core::{Config, OperationResult};

use crate::format_mod::{format_json_output, format_table_output};

pub(crate) fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let config = Config::load(explicit)?;
    debug!(source = ?config.source(), "config loaded");
    Ok(config)
}

/// `--templates` wins over the configured template directory.
pub(crate) fn template_renderer(config: &Config, explicit: Option<&Path>) -> TemplateRenderer {
    let dir = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.template_dir());
    TemplateRenderer::new(dir)
}

/// Prints the result and maps `success` to the process exit code.
pub(crate) fn emit(result: &OperationResult, json: bool) -> Result<ExitCode> {
    let rendered = if json {
        format_json_output(result)?
    } else {
        format_table_output(result)
    };
    println!("{}", rendered);
    Ok(exit_code(result.success))
}

pub(crate) fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Asks a yes/no question on stderr; anything but y/yes declines.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{} [y/N]: ", prompt)?;
    stderr.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
