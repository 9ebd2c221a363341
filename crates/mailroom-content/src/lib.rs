//! Message content: RFC 822 parsing into records, HTML stripping, templates.

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::debug;

use mailroom_core::{MailError, MailboxRecord, Result};

pub mod template;

pub use template::{TemplateRenderer, parse_context};

/// Parses a raw RFC 822 payload fetched for `id`.
pub fn parse_record(id: &str, raw: &[u8]) -> Result<MailboxRecord> {
    let parsed = mailparse::parse_mail(raw)
        .map_err(|e| MailError::transport(format!("Cannot parse message {}: {}", id, e)))?;

    let mut record = MailboxRecord {
        id: id.to_string(),
        from: header_text(&parsed, "From").unwrap_or_default(),
        to: header_text(&parsed, "To").unwrap_or_default(),
        subject: header_text(&parsed, "Subject").unwrap_or_default(),
        date: header_text(&parsed, "Date"),
        ..MailboxRecord::default()
    };

    if parsed.subparts.is_empty() {
        record.body = part_text(&parsed);
        return Ok(record);
    }

    let mut plain: Option<String> = None;
    let mut html: Option<String> = None;
    walk_parts(&parsed, &mut |part| {
        let disposition = part.get_content_disposition();
        if matches!(disposition.disposition, DispositionType::Attachment) {
            let filename = disposition
                .params
                .get("filename")
                .or_else(|| part.ctype.params.get("name"));
            if let Some(name) = filename {
                record.attachments.push(decode_words(name));
            }
            return;
        }
        match part.ctype.mimetype.to_lowercase().as_str() {
            "text/plain" if plain.is_none() => plain = Some(part_text(part)),
            "text/html" if html.is_none() => html = Some(part_text(part)),
            _ => {}
        }
    });

    record.body = match (plain, html) {
        (Some(text), _) => text,
        (None, Some(html)) => {
            let text = strip_html_tags(&html);
            html_escape::decode_html_entities(text.trim()).to_string()
        }
        (None, None) => String::new(),
    };
    debug!(
        id,
        attachments = record.attachments.len(),
        "parsed multipart message"
    );
    Ok(record)
}

/// Decodes RFC 2047 encoded words; anything already non-ASCII is kept.
pub fn decode_words(raw: &str) -> String {
    if !raw.is_ascii() || !raw.contains("=?") {
        return raw.to_string();
    }
    let line = format!("X: {}", raw);
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => raw.to_string(),
    }
}

/// Plain-text rendition of an HTML body: tags removed, `&nbsp;` replaced,
/// surrounding whitespace trimmed. Never contains `<` or `>`.
pub fn html_to_plain(html: &str) -> String {
    strip_html_tags(html)
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Removes markup; `<script>` and `<style>` lose their contents too.
/// Stray `>` characters are dropped and an unterminated tag ends the text.
pub fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.extend(rest[..open].chars().filter(|&ch| ch != '>'));
        let Some(close) = rest[open..].find('>').map(|i| open + i) else {
            return out;
        };
        let name = tag_name(&rest[open + 1..close]);
        rest = &rest[close + 1..];
        if let Some(element) = RAW_TEXT_ELEMENTS
            .iter()
            .find(|element| name.eq_ignore_ascii_case(element))
        {
            rest = after_closing_tag(rest, element);
        }
    }
    out.extend(rest.chars().filter(|&ch| ch != '>'));
    out
}

fn tag_name(tag: &str) -> &str {
    let end = tag
        .find(|ch: char| !ch.is_ascii_alphanumeric())
        .unwrap_or(tag.len());
    &tag[..end]
}

fn after_closing_tag<'a>(text: &'a str, element: &str) -> &'a str {
    let closing = format!("</{}", element);
    let Some(start) = text.to_ascii_lowercase().find(&closing) else {
        return "";
    };
    match text[start..].find('>') {
        Some(end) => &text[start + end + 1..],
        None => "",
    }
}

fn header_text(parsed: &ParsedMail, name: &str) -> Option<String> {
    let header = parsed.headers.get_first_header(name)?;
    let raw = header.get_value_raw();
    if raw.is_ascii() {
        Some(header.get_value())
    } else {
        // 8-bit header bytes are taken as UTF-8.
        let text = String::from_utf8_lossy(raw);
        Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

fn part_text(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(body) => body,
        Err(_) => part
            .get_body_raw()
            .map(|raw| String::from_utf8_lossy(&raw).to_string())
            .unwrap_or_default(),
    }
}

fn walk_parts<F>(parsed: &ParsedMail, cb: &mut F)
where
    F: FnMut(&ParsedMail),
{
    cb(parsed);
    for part in &parsed.subparts {
        walk_parts(part, cb);
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_words, html_to_plain, parse_record, strip_html_tags};

    const MULTIPART: &str = "From: =?UTF-8?B?SsO8cmdlbg==?= <j@example.com>\r\n\
To: me@example.com\r\n\
Subject: =?utf-8?q?Caf=C3=A9?= =?utf-8?q?_menu?=\r\n\
Date: Tue, 3 Mar 2026 10:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain body here\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"menu.pdf\"\r\n\
Content-Disposition: attachment; filename=\"menu.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--outer--\r\n";

    const HTML_ONLY: &str = "From: a@example.com\r\n\
To: b@example.com\r\n\
Subject: html\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><h1>Hello</h1> <p>Fish &amp; chips</p></body></html>\r\n\
--b--\r\n";

    #[test]
    fn multipart_prefers_plain_and_lists_attachments() {
        let record = parse_record("12", MULTIPART.as_bytes()).unwrap();
        assert_eq!(record.id, "12");
        assert_eq!(record.from, "Jürgen <j@example.com>");
        assert_eq!(record.to, "me@example.com");
        assert_eq!(record.subject, "Café menu");
        assert_eq!(record.date.as_deref(), Some("Tue, 3 Mar 2026 10:00:00 +0000"));
        assert!(record.body.contains("Plain body here"));
        assert_eq!(record.attachments, vec!["menu.pdf"]);
        assert!(record.error.is_none());
    }

    #[test]
    fn html_only_multipart_is_stripped() {
        let record = parse_record("3", HTML_ONLY.as_bytes()).unwrap();
        assert_eq!(record.body, "Hello Fish & chips");
        assert!(record.attachments.is_empty());
    }

    #[test]
    fn single_part_is_decoded_directly() {
        let raw = "From: a@example.com\r\n\
Subject: plain\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
na=C3=AFve\r\n";
        let record = parse_record("1", raw.as_bytes()).unwrap();
        assert_eq!(record.body.trim_end(), "naïve");
        assert_eq!(record.to, "");
        assert_eq!(record.date, None);
    }

    #[test]
    fn raw_utf8_headers_are_kept() {
        let raw = "From: Zoë <z@example.com>\r\nSubject: Grüße\r\n\r\nbody\r\n";
        let record = parse_record("5", raw.as_bytes()).unwrap();
        assert_eq!(record.subject, "Grüße");
        assert_eq!(record.from, "Zoë <z@example.com>");
    }

    #[test]
    fn encoded_attachment_names_are_decoded() {
        assert_eq!(decode_words("=?utf-8?b?cmVwb3J0LnBkZg==?="), "report.pdf");
        assert_eq!(decode_words("plain.txt"), "plain.txt");
    }

    #[test]
    fn html_to_plain_drops_markup_and_nbsp() {
        let plain = html_to_plain("  <div>Hi&nbsp;there <b>you</b></div> a > b  ");
        assert_eq!(plain, "Hi there you a  b");
        assert!(!plain.contains('<') && !plain.contains('>'));
        assert!(!plain.contains("&nbsp;"));
    }

    #[test]
    fn strip_keeps_text_between_tags() {
        assert_eq!(strip_html_tags("<p>a</p><p>b</p>"), "ab");
    }

    #[test]
    fn strip_drops_script_and_style_bodies() {
        let html = "<html><head><STYLE type=\"text/css\">p { color: red; }</STYLE></head>\
                    <body><p>Hi</p><script>if (a > b) { alert(1) }</Script><p>there</p></body></html>";
        assert_eq!(strip_html_tags(html), "Hithere");
        assert_eq!(strip_html_tags("<p>kept</p><scripted>x</scripted>"), "keptx");
        assert_eq!(strip_html_tags("a<script>never closed"), "a");
        assert_eq!(strip_html_tags("a <b"), "a ");
    }
}
