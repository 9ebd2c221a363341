//! Shared data model, error taxonomy and configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod config;
mod error;

pub use config::{Account, Config, ConfigFile, ConfigSource, Preset, Settings};
pub use error::{MailError, Result};

pub const DEFAULT_FOLDER: &str = "INBOX";

/// A message ready to be handed to the SMTP sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub plain_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    /// Envelope recipients: To, then Cc, then Bcc.
    pub fn recipients(&self) -> Vec<&str> {
        std::iter::once(self.to.as_str())
            .chain(self.cc.iter().map(String::as_str))
            .chain(self.bcc.iter().map(String::as_str))
            .collect()
    }
}

/// One fetched email, parsed from the raw RFC 822 payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: Option<String>,
    pub body: String,
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MailboxRecord {
    pub fn unavailable(id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Listing {
        folder: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        total: usize,
        emails: Vec<MailboxRecord>,
    },
    Message {
        folder: String,
        email_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<MailboxRecord>,
    },
    Deleted {
        folder: String,
        email_id: String,
    },
    Folders {
        folders: Vec<String>,
    },
    FolderCreated {
        folder: String,
    },
    Sent {
        to: String,
        subject: String,
        message_id: Option<String>,
    },
    Presets {
        presets: Vec<String>,
        total: usize,
        #[serde(skip)]
        entries: BTreeMap<String, Preset>,
    },
    Preset {
        name: String,
        preset: Option<Preset>,
    },
    Recipients {
        groups: Vec<String>,
        total: usize,
        #[serde(skip)]
        members: BTreeMap<String, Vec<String>>,
    },
}

impl Payload {
    pub fn empty_listing(folder: &str, query: Option<&str>) -> Self {
        Self::Listing {
            folder: folder.to_string(),
            query: query.map(str::to_string),
            total: 0,
            emails: Vec::new(),
        }
    }

    pub fn presets(entries: &BTreeMap<String, Preset>) -> Self {
        Self::Presets {
            presets: entries.keys().cloned().collect(),
            total: entries.len(),
            entries: entries.clone(),
        }
    }

    pub fn recipients(members: &BTreeMap<String, Vec<String>>) -> Self {
        Self::Recipients {
            groups: members.keys().cloned().collect(),
            total: members.len(),
            members: members.clone(),
        }
    }
}

/// Uniform result of every command. Failures travel here instead of as
/// errors so a single formatter can print them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl OperationResult {
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
            payload,
        }
    }

    pub fn failed(payload: Payload, err: &MailError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
            payload,
        }
    }

    /// Converts an operation outcome, using `fallback` as the payload of a
    /// failed result.
    pub fn settle<F>(outcome: Result<Payload>, fallback: F) -> Self
    where
        F: FnOnce() -> Payload,
    {
        match outcome {
            Ok(payload) => Self::ok(payload),
            Err(err) => {
                tracing::warn!(kind = err.kind(), "operation failed: {}", err);
                Self::failed(fallback(), &err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MailError, MailboxRecord, OperationResult, OutgoingMessage, Payload};

    #[test]
    fn listing_serializes_flat_for_the_notifier() {
        let result = OperationResult::ok(Payload::Listing {
            folder: "INBOX".to_string(),
            query: None,
            total: 1,
            emails: vec![MailboxRecord {
                id: "7".to_string(),
                from: "Ann <ann@x.com>".to_string(),
                to: "me@x.com".to_string(),
                subject: "Hi".to_string(),
                date: None,
                body: "hello".to_string(),
                attachments: vec![],
                error: None,
            }],
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "folder": "INBOX",
                "total": 1,
                "emails": [{
                    "id": "7",
                    "from": "Ann <ann@x.com>",
                    "to": "me@x.com",
                    "subject": "Hi",
                    "date": null,
                    "body": "hello",
                    "attachments": []
                }]
            })
        );
    }

    #[test]
    fn settle_keeps_fallback_payload_on_failure() {
        let result = OperationResult::settle(Err(MailError::transport("connection reset")), || {
            Payload::Deleted {
                folder: "INBOX".to_string(),
                email_id: "42".to_string(),
            }
        });
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("connection reset"));
        assert_eq!(result.error_kind.as_deref(), Some("transport"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["email_id"], "42");
    }

    #[test]
    fn recipients_are_to_then_cc_then_bcc() {
        let message = OutgoingMessage {
            to: "a@x.com".to_string(),
            cc: vec!["b@x.com".to_string()],
            bcc: vec!["c@x.com".to_string()],
            ..OutgoingMessage::default()
        };
        assert_eq!(message.recipients(), vec!["a@x.com", "b@x.com", "c@x.com"]);
    }
}
