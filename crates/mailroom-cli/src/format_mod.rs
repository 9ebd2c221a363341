use std::collections::BTreeMap;
use std::fmt::Write as _;

use crossterm::style::Stylize;

use mailroom_core::{MailboxRecord, OperationResult, Payload, Preset};

const SUBJECT_WIDTH: usize = 50;

/// Pretty JSON with two-space indent; non-ASCII text is kept as is.
pub(crate) fn format_json_output(result: &OperationResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

pub(crate) fn format_table_output(result: &OperationResult) -> String {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("Unknown error");
        return format!("✗ Failed: {}", reason).as_str().red().to_string();
    }
    match &result.payload {
        Payload::Listing {
            folder,
            query,
            total,
            emails,
        } => format_listing(folder, query.as_deref(), *total, emails),
        Payload::Message {
            email: Some(email),
            ..
        } => format_read_view(email),
        Payload::Folders { folders } => {
            let mut out = format!("\n{}\n", "Folders:".cyan());
            for folder in folders {
                let _ = writeln!(out, "  {} {}", "•".green(), folder);
            }
            out
        }
        Payload::Presets { entries, .. } => format_presets(entries),
        Payload::Preset {
            name,
            preset: Some(preset),
        } => format!(
            "\n{}\n\n{}\n{}\n\n{}\n{}\n",
            format!("Preset: {}", name).as_str().cyan(),
            "Subject:".yellow(),
            preset.subject,
            "Body:".yellow(),
            preset.body
        ),
        Payload::Recipients { members, .. } => format_recipients(members),
        _ => "✓ Success".green().to_string(),
    }
}

fn format_listing(
    folder: &str,
    query: Option<&str>,
    total: usize,
    emails: &[MailboxRecord],
) -> String {
    let mut out = format!("\n{}\n", format!("Folder: {}", folder).as_str().cyan());
    if let Some(query) = query {
        let _ = writeln!(out, "{}", format!("Query: {}", query).as_str().cyan());
    }
    let _ = writeln!(out, "{}\n", format!("Total: {}", total).as_str().cyan());
    for (idx, email) in emails.iter().enumerate() {
        let _ = writeln!(
            out,
            "{} {} {}",
            format!("[{}]", idx + 1).as_str().green(),
            "From:".yellow(),
            or_placeholder(&email.from, "Unknown")
        );
        let _ = writeln!(
            out,
            "      {} {}",
            "Subject:".yellow(),
            or_placeholder(&email.subject, "No Subject")
        );
        let _ = writeln!(
            out,
            "      {} {}\n",
            "Date:".yellow(),
            email.date.as_deref().unwrap_or("Unknown")
        );
        if let Some(err) = &email.error {
            let _ = writeln!(out, "      {}\n", err.as_str().red());
        }
    }
    out
}

fn format_read_view(email: &MailboxRecord) -> String {
    let attachments = if email.attachments.is_empty() {
        "None".to_string()
    } else {
        email.attachments.join(", ")
    };
    format!(
        "\n{} {}\n{} {}\n{} {}\n{} {}\n{} {}\n\n{}\n{}\n",
        "From:".cyan(),
        email.from,
        "To:".cyan(),
        email.to,
        "Subject:".cyan(),
        email.subject,
        "Date:".cyan(),
        email.date.as_deref().unwrap_or("Unknown"),
        "Attachments:".cyan(),
        attachments,
        "Body:".cyan(),
        email.body
    )
}

fn format_presets(entries: &BTreeMap<String, Preset>) -> String {
    if entries.is_empty() {
        return "No presets found in config".to_string();
    }
    let mut out = format!("\n{}\n\n", "Available Presets:".cyan());
    for (name, preset) in entries {
        let _ = writeln!(out, "  {} {}", "•".green(), name);
        let _ = writeln!(out, "    Subject: {}\n", or_placeholder(&preset.subject, "N/A"));
    }
    out
}

fn format_recipients(members: &BTreeMap<String, Vec<String>>) -> String {
    if members.is_empty() {
        return "No recipient groups found in config".to_string();
    }
    let mut out = format!("\n{}\n\n", "Available Groups:".cyan());
    for (name, group) in members {
        let _ = writeln!(
            out,
            "  {} {} ({} recipients)",
            "•".green(),
            name,
            group.len()
        );
        for addr in group {
            let _ = writeln!(out, "    - {}", addr);
        }
        out.push('\n');
    }
    out
}

/// Notification text for a `list --unread` result.
pub(crate) fn format_unread_summary(result: &OperationResult) -> String {
    let (folder, total, emails) = match &result.payload {
        Payload::Listing {
            folder,
            total,
            emails,
            ..
        } if *total > 0 => (folder, *total, emails),
        _ => return "📬 No new unread emails.".to_string(),
    };
    let mut out = format!(
        "📬 You have **{} unread email(s)** in {}:\n\n",
        total, folder
    );
    for (idx, email) in emails.iter().enumerate() {
        let from_name = email.from.split('<').next().unwrap_or_default().trim();
        let _ = writeln!(out, "{}. From: **{}**", idx + 1, from_name);
        let _ = writeln!(out, "   Subject: {}", truncate_subject(&email.subject));
        let _ = writeln!(
            out,
            "   Date: {}\n",
            email.date.as_deref().unwrap_or("Unknown")
        );
    }
    out
}

fn truncate_subject(subject: &str) -> String {
    if subject.chars().count() > SUBJECT_WIDTH {
        let head: String = subject.chars().take(SUBJECT_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        subject.to_string()
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}
