use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use mailroom_core::DEFAULT_FOLDER;

#[path = "cli_command_handlers.rs"]
mod cli_command_handlers;
#[path = "cli_runtime_helpers.rs"]
mod cli_runtime_helpers;

pub(crate) use cli_command_handlers::run_cli;
pub(crate) use cli_runtime_helpers::{confirm, emit, exit_code, load_config, template_renderer};

#[derive(Parser, Debug)]
#[command(name = "mailroom", version, about = "Send and manage email over SMTP/IMAP")]
pub(crate) struct Cli {
    /// Config file, overrides EMAIL_CONFIG and the default locations.
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Template directory, overrides settings.template_dir.
    #[arg(long, global = true)]
    pub(crate) templates: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Send an email.
    Send(SendCmd),
    /// List emails in a folder.
    #[command(alias = "list-emails")]
    List(ListCmd),
    /// Read a specific email.
    Read(ReadCmd),
    /// Search emails with an IMAP query.
    Search(SearchCmd),
    /// Delete an email.
    Delete(DeleteCmd),
    /// Manage email folders.
    Folders(FoldersCmd),
    /// Manage message presets.
    Presets(PresetsCmd),
    /// Manage recipient groups.
    Recipients(RecipientsCmd),
    /// Summarize unread emails for notifications.
    Check(CheckCmd),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct CommonArgs {
    /// Account name from config.
    #[arg(short = 'a', long)]
    pub(crate) account: Option<String>,
    /// Output as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SendCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    /// Recipient address or group name.
    #[arg(short = 't', long)]
    pub(crate) to: Option<String>,
    #[arg(short = 's', long)]
    pub(crate) subject: Option<String>,
    /// Plain text body.
    #[arg(short = 'b', long)]
    pub(crate) body: Option<String>,
    /// HTML body.
    #[arg(long)]
    pub(crate) html: Option<String>,
    /// Template name in the template directory.
    #[arg(long)]
    pub(crate) template: Option<String>,
    /// Message preset from config.
    #[arg(short = 'p', long)]
    pub(crate) preset: Option<String>,
    /// JSON object used by the template, subject and body.
    #[arg(short = 'c', long)]
    pub(crate) context: Option<String>,
    #[arg(long)]
    pub(crate) cc: Vec<String>,
    #[arg(long)]
    pub(crate) bcc: Vec<String>,
    #[arg(long = "attach")]
    pub(crate) attachments: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ListCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'f', long, default_value = DEFAULT_FOLDER)]
    pub(crate) folder: String,
    #[arg(short = 'l', long, default_value_t = 10)]
    pub(crate) limit: usize,
    /// Only unread emails.
    #[arg(long)]
    pub(crate) unread: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReadCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'f', long, default_value = DEFAULT_FOLDER)]
    pub(crate) folder: String,
    #[arg(long = "id")]
    pub(crate) id: String,
}

#[derive(Args, Debug)]
pub(crate) struct SearchCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'f', long, default_value = DEFAULT_FOLDER)]
    pub(crate) folder: String,
    /// Raw IMAP SEARCH criteria, e.g. 'FROM "boss@example.com"'.
    #[arg(short = 'q', long)]
    pub(crate) query: String,
    #[arg(short = 'l', long, default_value_t = 10)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug)]
pub(crate) struct DeleteCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'f', long, default_value = DEFAULT_FOLDER)]
    pub(crate) folder: String,
    #[arg(long = "id")]
    pub(crate) id: String,
    /// Skip confirmation.
    #[arg(short = 'y', long)]
    pub(crate) yes: bool,
}

#[derive(Args, Debug)]
pub(crate) struct FoldersCmd {
    #[command(subcommand)]
    pub(crate) command: FoldersCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum FoldersCommand {
    List(CommonArgs),
    Create(FoldersCreate),
}

#[derive(Args, Debug)]
pub(crate) struct FoldersCreate {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'n', long)]
    pub(crate) name: String,
}

#[derive(Args, Debug)]
pub(crate) struct PresetsCmd {
    #[command(subcommand)]
    pub(crate) command: PresetsCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum PresetsCommand {
    List(CommonArgs),
    Show(PresetsShow),
}

#[derive(Args, Debug)]
pub(crate) struct PresetsShow {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'n', long)]
    pub(crate) name: String,
}

#[derive(Args, Debug)]
pub(crate) struct RecipientsCmd {
    #[command(subcommand)]
    pub(crate) command: RecipientsCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum RecipientsCommand {
    List(CommonArgs),
}

#[derive(Args, Debug)]
pub(crate) struct CheckCmd {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
    #[arg(short = 'f', long, default_value = DEFAULT_FOLDER)]
    pub(crate) folder: String,
    #[arg(short = 'l', long, default_value_t = 10)]
    pub(crate) limit: usize,
}
