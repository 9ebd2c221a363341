use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, Message, SmtpTransport, Transport};
use mailparse::{MailAddr, addrparse};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use mailroom_content::{TemplateRenderer, html_to_plain};
use mailroom_core::{Account, MailError, OperationResult, OutgoingMessage, Payload, Result};

/// Hands a built message to a mail server.
pub trait Submit {
    fn submit(&self, email: &Message) -> Result<()>;
}

impl Submit for SmtpTransport {
    fn submit(&self, email: &Message) -> Result<()> {
        self.send(email).map(|_| ()).map_err(classify_smtp_error)
    }
}

pub struct SmtpSender<'a> {
    account: &'a Account,
}

impl<'a> SmtpSender<'a> {
    pub fn new(account: &'a Account) -> Self {
        Self { account }
    }

    /// Builds and sends `message` over a fresh SMTP connection.
    pub fn send(&self, message: &OutgoingMessage) -> OperationResult {
        let outcome = build_message(message).and_then(|email| {
            let transport = smtp_transport(self.account)?;
            deliver(&transport, &email)
        });
        sent_result(message, outcome)
    }

    /// Same as [`send`](Self::send) but through a caller supplied transport.
    pub fn send_via<T: Submit>(&self, transport: &T, message: &OutgoingMessage) -> OperationResult {
        let outcome = build_message(message).and_then(|email| deliver(transport, &email));
        sent_result(message, outcome)
    }

    /// Renders `template` as the HTML body, derives the plain body from it
    /// and sends the result.
    pub fn send_template(
        &self,
        renderer: &TemplateRenderer,
        template: &str,
        context: &JsonValue,
        message: OutgoingMessage,
    ) -> OperationResult {
        send_rendered(renderer, template, context, message, |message| {
            self.send(message)
        })
    }

    /// [`send_template`](Self::send_template) through a caller supplied transport.
    pub fn send_template_via<T: Submit>(
        &self,
        transport: &T,
        renderer: &TemplateRenderer,
        template: &str,
        context: &JsonValue,
        message: OutgoingMessage,
    ) -> OperationResult {
        send_rendered(renderer, template, context, message, |message| {
            self.send_via(transport, message)
        })
    }
}

fn send_rendered<F>(
    renderer: &TemplateRenderer,
    template: &str,
    context: &JsonValue,
    message: OutgoingMessage,
    send: F,
) -> OperationResult
where
    F: FnOnce(&OutgoingMessage) -> OperationResult,
{
    match render_bodies(renderer, template, context, message) {
        Ok(message) => send(&message),
        Err((message, err)) => {
            warn!(template, "template send failed: {}", err);
            OperationResult::failed(sent_payload(&message, None), &err)
        }
    }
}

fn render_bodies(
    renderer: &TemplateRenderer,
    template: &str,
    context: &JsonValue,
    message: OutgoingMessage,
) -> std::result::Result<OutgoingMessage, (OutgoingMessage, MailError)> {
    match renderer.render(template, context) {
        Ok(html) => Ok(OutgoingMessage {
            plain_body: html_to_plain(&html),
            html_body: Some(html),
            ..message
        }),
        Err(err) => Err((message, err)),
    }
}

fn deliver<T: Submit>(transport: &T, email: &Message) -> Result<Option<String>> {
    transport.submit(email)?;
    let message_id = email
        .headers()
        .get_raw("Message-ID")
        .map(|id| id.trim().to_string());
    info!(message_id = ?message_id, "message accepted");
    Ok(message_id)
}

fn sent_result(message: &OutgoingMessage, outcome: Result<Option<String>>) -> OperationResult {
    OperationResult::settle(
        outcome.map(|id| sent_payload(message, id)),
        || sent_payload(message, None),
    )
}

fn sent_payload(message: &OutgoingMessage, message_id: Option<String>) -> Payload {
    Payload::Sent {
        to: message.to.clone(),
        subject: message.subject.clone(),
        message_id,
    }
}

/// Builds the MIME message. Attachments are read here so a missing file
/// fails before any connection is made.
pub fn build_message(message: &OutgoingMessage) -> Result<Message> {
    let attachments = message
        .attachments
        .iter()
        .map(|path| load_attachment(path))
        .collect::<Result<Vec<_>>>()?;

    let to_addrs = parse_mailbox_list(&message.to)?;
    if to_addrs.is_empty() {
        return Err(MailError::validation("No recipients"));
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(message.subject.as_str())
        .message_id(None);
    for addr in to_addrs {
        builder = builder.to(addr);
    }
    for addr in &message.cc {
        builder = builder.cc(parse_mailbox(addr)?);
    }
    for addr in &message.bcc {
        builder = builder.bcc(parse_mailbox(addr)?);
    }

    let plain = message.plain_body.clone();
    let built = if attachments.is_empty() {
        match &message.html_body {
            Some(html) => {
                builder.multipart(MultiPart::alternative_plain_html(plain, html.clone()))
            }
            None => builder.body(plain),
        }
    } else {
        let mut multipart = match &message.html_body {
            Some(html) => MultiPart::mixed()
                .multipart(MultiPart::alternative_plain_html(plain, html.clone())),
            None => MultiPart::mixed().singlepart(SinglePart::plain(plain)),
        };
        for attachment in attachments {
            multipart = multipart.singlepart(attachment);
        }
        builder.multipart(multipart)
    };
    built.map_err(|e| MailError::validation(format!("Cannot build message: {}", e)))
}

fn load_attachment(path: &Path) -> Result<SinglePart> {
    if !path.is_file() {
        return Err(MailError::AttachmentNotFound(path.to_path_buf()));
    }
    let data = std::fs::read(path).map_err(|e| {
        MailError::validation(format!("Cannot read attachment {}: {}", path.display(), e))
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = ContentType::parse(mime.essence_str())
        .map_err(|e| MailError::validation(format!("Bad content type {}: {}", mime, e)))?;
    debug!(file = %filename, mime = %mime, bytes = data.len(), "attaching");
    Ok(Attachment::new(filename).body(data, content_type))
}

fn smtp_transport(account: &Account) -> Result<SmtpTransport> {
    debug!(
        host = %account.smtp_host,
        port = account.smtp_port,
        tls = account.use_ssl,
        "smtp connect"
    );
    let creds = Credentials::new(account.username.clone(), account.password.clone());
    let builder = SmtpTransport::builder_dangerous(&account.smtp_host).port(account.smtp_port);
    let builder = if account.use_ssl {
        let mut tls_builder = TlsParameters::builder(account.smtp_host.clone());
        if account.skip_tls_verify {
            tls_builder = tls_builder
                .dangerous_accept_invalid_certs(true)
                .dangerous_accept_invalid_hostnames(true);
        }
        let tls_parameters = tls_builder
            .build()
            .map_err(|e| MailError::transport(format!("TLS setup failed: {}", e)))?;
        if account.smtp_port == 465 {
            builder.tls(Tls::Wrapper(tls_parameters))
        } else {
            builder.tls(Tls::Required(tls_parameters))
        }
    } else {
        builder.tls(Tls::None)
    };
    Ok(builder.credentials(creds).build())
}

/// 530/534/535 replies and a missing auth mechanism mean the credentials
/// were refused; everything else is a transport problem.
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> MailError {
    let code = err.status().map(|code| code.to_string());
    let refused = matches!(code.as_deref(), Some("530" | "534" | "535"))
        || err.to_string().to_lowercase().contains("authentication");
    if refused {
        MailError::Auth(err.to_string())
    } else {
        MailError::transport(format!("SMTP error: {}", err))
    }
}

fn parse_mailbox(input: &str) -> Result<Mailbox> {
    let trimmed = input.trim();
    let invalid = |e: lettre::address::AddressError| {
        MailError::validation(format!("Invalid address '{}': {}", trimmed, e))
    };
    let angle = trimmed.rfind('<').and_then(|start| {
        trimmed[start..]
            .find('>')
            .map(|offset| (start, start + offset))
    });
    if let Some((start, end)) = angle {
        let name = trimmed[..start].trim().trim_matches('"');
        let addr = trimmed[start + 1..end].trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        let addr: Address = addr.parse().map_err(invalid)?;
        return Ok(Mailbox::new(name, addr));
    }
    let addr: Address = trimmed.parse().map_err(invalid)?;
    Ok(Mailbox::new(None, addr))
}

fn parse_mailbox_list(input: &str) -> Result<Vec<Mailbox>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parsed = addrparse(trimmed)
        .map_err(|e| MailError::validation(format!("Invalid address list '{}': {}", trimmed, e)))?;
    let mut out = Vec::new();
    for addr in parsed.iter() {
        let infos = match addr {
            MailAddr::Single(info) => std::slice::from_ref(info),
            MailAddr::Group(group) => group.addrs.as_slice(),
        };
        for info in infos {
            let parsed: Address = info.addr.parse().map_err(|e| {
                MailError::validation(format!("Invalid address '{}': {}", info.addr, e))
            })?;
            out.push(Mailbox::new(info.display_name.clone(), parsed));
        }
    }
    Ok(out)
}
