use std::path::PathBuf;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use mailroom_content::{TemplateRenderer, parse_context};
use mailroom_core::{Account, Config, MailError, OutgoingMessage, Result};

/// Raw `send` arguments as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub html: Option<String>,
    pub template: Option<String>,
    pub preset: Option<String>,
    pub context: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Composed {
    Plain(OutgoingMessage),
    Template {
        message: OutgoingMessage,
        name: String,
        context: JsonValue,
    },
}

impl Composed {
    pub fn message(&self) -> &OutgoingMessage {
        match self {
            Self::Plain(message) | Self::Template { message, .. } => message,
        }
    }
}

/// Resolves groups, presets and defaults into a message for `account`.
pub fn compose(
    request: SendRequest,
    config: &Config,
    account: &Account,
    renderer: &TemplateRenderer,
) -> Result<Composed> {
    let settings = config.get_settings();
    let mut cc = merge_unique(&request.cc, &settings.default_cc);
    let bcc = merge_unique(&request.bcc, &settings.default_bcc);

    let mut to = request
        .to
        .map(|to| to.trim().to_string())
        .filter(|to| !to.is_empty())
        .ok_or_else(|| MailError::validation("A recipient (--to) is required"))?;
    if !to.contains('@') {
        match config.get_recipients(&to) {
            Some([first, rest @ ..]) => {
                debug!(group = %to, members = rest.len() + 1, "expanding recipient group");
                cc = merge_unique(&cc, rest);
                to = first.clone();
            }
            _ => warn!(group = %to, "recipient group not found, sending as given"),
        }
    }

    let mut subject = request.subject.unwrap_or_default();
    let mut body = request.body.unwrap_or_default();
    if let Some(name) = &request.preset {
        let preset = config.get_message_preset(name)?;
        if subject.is_empty() {
            subject = preset.subject.clone();
        }
        if body.is_empty() && request.html.is_none() && request.template.is_none() {
            body = preset.body.clone();
        }
    }

    let context = request.context.as_deref().map(parse_context).transpose()?;

    let message = OutgoingMessage {
        from: account.sender().to_string(),
        to,
        cc,
        bcc,
        subject,
        plain_body: body,
        html_body: request.html,
        attachments: request.attachments,
    };

    if let Some(name) = request.template {
        if !message.plain_body.is_empty() {
            return Err(MailError::validation(
                "Cannot use --template together with --body",
            ));
        }
        let context = context.ok_or_else(|| {
            MailError::validation("--context is required when using --template")
        })?;
        return Ok(Composed::Template {
            message,
            name,
            context,
        });
    }

    match context {
        Some(context) => render_inline(message, &context, renderer).map(Composed::Plain),
        None => Ok(Composed::Plain(message)),
    }
}

fn render_inline(
    mut message: OutgoingMessage,
    context: &JsonValue,
    renderer: &TemplateRenderer,
) -> Result<OutgoingMessage> {
    message.subject = renderer.render_inline(&message.subject, context)?;
    if !message.plain_body.is_empty() {
        message.plain_body = renderer.render_inline(&message.plain_body, context)?;
    }
    Ok(message)
}

fn merge_unique(first: &[String], second: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for addr in first.iter().chain(second) {
        let addr = addr.trim();
        if !addr.is_empty() && !out.iter().any(|seen| seen == addr) {
            out.push(addr.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Composed, SendRequest, compose};
    use mailroom_content::TemplateRenderer;
    use mailroom_core::{Config, MailError};

    const CONFIG: &str = r#"{
        "accounts": {
            "primary": {
                "smtp_host": "smtp.example.com",
                "imap_host": "imap.example.com",
                "username": "me@example.com",
                "password": "pw"
            }
        },
        "presets": {
            "standup": {"subject": "Daily standup", "body": "Notes for {{ day }}"}
        },
        "recipients": {
            "team": ["lead@example.com", "dev@example.com", "qa@example.com"]
        },
        "settings": {
            "default_cc": ["archive@example.com"],
            "default_bcc": ["audit@example.com"]
        }
    }"#;

    fn setup() -> (Config, TemplateRenderer) {
        let config = Config::from_json_str(CONFIG).unwrap();
        let renderer = TemplateRenderer::new(std::env::temp_dir().join("mailroom-no-templates"));
        (config, renderer)
    }

    fn request(to: &str) -> SendRequest {
        SendRequest {
            to: Some(to.to_string()),
            subject: Some("Hello".to_string()),
            body: Some("Body".to_string()),
            ..SendRequest::default()
        }
    }

    #[test]
    fn group_expands_and_defaults_merge_without_duplicates() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let composed = compose(
            SendRequest {
                cc: vec!["archive@example.com".to_string(), "qa@example.com".to_string()],
                ..request("team")
            },
            &config,
            account,
            &renderer,
        )
        .unwrap();
        let message = composed.message();
        assert_eq!(message.from, "me@example.com");
        assert_eq!(message.to, "lead@example.com");
        assert_eq!(
            message.cc,
            vec!["archive@example.com", "qa@example.com", "dev@example.com"]
        );
        assert_eq!(message.bcc, vec!["audit@example.com"]);
        assert!(matches!(composed, Composed::Plain(_)));
    }

    #[test]
    fn two_member_group_sends_to_first_and_copies_second() {
        let config = Config::from_json_str(
            r#"{
                "accounts": {"primary": {
                    "smtp_host": "s", "imap_host": "i", "username": "me@x.com", "password": "p"
                }},
                "recipients": {"team": ["a@x.com", "b@x.com"]}
            }"#,
        )
        .unwrap();
        let renderer = TemplateRenderer::new(std::env::temp_dir().join("mailroom-no-templates"));
        let account = config.get_account(None).unwrap();
        let composed = compose(request("team"), &config, account, &renderer).unwrap();
        assert_eq!(composed.message().to, "a@x.com");
        assert_eq!(composed.message().cc, vec!["b@x.com"]);
        assert!(composed.message().bcc.is_empty());
    }

    #[test]
    fn unknown_group_is_kept_as_is() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let composed = compose(request("nobody"), &config, account, &renderer).unwrap();
        assert_eq!(composed.message().to, "nobody");
        assert_eq!(composed.message().cc, vec!["archive@example.com"]);
    }

    #[test]
    fn preset_fills_only_empty_fields() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let composed = compose(
            SendRequest {
                to: Some("a@example.com".to_string()),
                preset: Some("standup".to_string()),
                ..SendRequest::default()
            },
            &config,
            account,
            &renderer,
        )
        .unwrap();
        assert_eq!(composed.message().subject, "Daily standup");
        assert_eq!(composed.message().plain_body, "Notes for {{ day }}");

        let composed = compose(
            SendRequest {
                preset: Some("standup".to_string()),
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        )
        .unwrap();
        assert_eq!(composed.message().subject, "Hello");
        assert_eq!(composed.message().plain_body, "Body");
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let err = compose(
            SendRequest {
                preset: Some("weekly".to_string()),
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        )
        .unwrap_err();
        assert!(matches!(err, MailError::Config(_)));
        assert_eq!(err.to_string(), "Preset 'weekly' not found in config");
    }

    #[test]
    fn template_conflicts_and_requirements() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let with_body = compose(
            SendRequest {
                template: Some("welcome".to_string()),
                context: Some("{}".to_string()),
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        );
        assert!(matches!(with_body, Err(MailError::Validation(_))));

        let without_context = compose(
            SendRequest {
                template: Some("welcome".to_string()),
                body: None,
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        );
        assert!(matches!(without_context, Err(MailError::Validation(_))));

        let ok = compose(
            SendRequest {
                template: Some("welcome".to_string()),
                context: Some(r#"{"name": "Ann"}"#.to_string()),
                body: None,
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        )
        .unwrap();
        match ok {
            Composed::Template { name, context, .. } => {
                assert_eq!(name, "welcome");
                assert_eq!(context, json!({"name": "Ann"}));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn context_renders_subject_and_body_inline() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let composed = compose(
            SendRequest {
                preset: Some("standup".to_string()),
                subject: Some("Standup {{ day }} & more".to_string()),
                body: None,
                context: Some(r#"{"day": "Monday"}"#.to_string()),
                ..request("a@example.com")
            },
            &config,
            account,
            &renderer,
        )
        .unwrap();
        assert_eq!(composed.message().subject, "Standup Monday & more");
        assert_eq!(composed.message().plain_body, "Notes for Monday");
    }

    #[test]
    fn missing_recipient_is_rejected() {
        let (config, renderer) = setup();
        let account = config.get_account(None).unwrap();
        let err = compose(
            SendRequest {
                to: Some("   ".to_string()),
                ..SendRequest::default()
            },
            &config,
            account,
            &renderer,
        )
        .unwrap_err();
        assert!(matches!(err, MailError::Validation(_)));
    }
}
