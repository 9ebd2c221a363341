use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MailError>;

/// Failures surfaced by config loading, composing and the mail clients.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("{0}")]
    Config(String),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Template '{name}' failed to render: {reason}")]
    Template { name: String, reason: String },

    #[error("Attachment not found: {}", .0.display())]
    AttachmentNotFound(PathBuf),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Validation(String),
}

impl MailError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable tag written as `error_kind` in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::Template { .. } => "template",
            Self::AttachmentNotFound(_) => "attachment_not_found",
            Self::Auth(_) => "auth",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::MailError;

    #[test]
    fn attachment_error_names_the_path() {
        let err = MailError::AttachmentNotFound(PathBuf::from("/tmp/missing.pdf"));
        assert_eq!(err.to_string(), "Attachment not found: /tmp/missing.pdf");
        assert_eq!(err.kind(), "attachment_not_found");
    }

    #[test]
    fn config_error_keeps_message_verbatim() {
        let err = MailError::config("Account 'work' not found in configuration");
        assert_eq!(err.to_string(), "Account 'work' not found in configuration");
        assert_eq!(err.kind(), "config");
    }
}
