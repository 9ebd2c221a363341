use std::process::ExitCode;

use anyhow::Result;
use tracing::info;

use mailroom_core::{OperationResult, Payload};
use mailroom_mail::{Composed, MailboxClient, SendRequest, SmtpSender, compose};

use super::{
    Cli, CliCommand, FoldersCommand, PresetsCommand, RecipientsCommand, SendCmd, confirm, emit,
    exit_code, load_config, template_renderer,
};
use crate::format_mod::format_unread_summary;

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config: config_path,
        templates,
        command,
    } = cli;

    if let CliCommand::Delete(cmd) = &command {
        if !cmd.yes && !confirm(&format!("Delete email {} from {}?", cmd.id, cmd.folder))? {
            eprintln!("Aborted!");
            return Ok(ExitCode::FAILURE);
        }
    }

    let config = load_config(config_path.as_deref())?;

    match command {
        CliCommand::Send(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let renderer = template_renderer(&config, templates.as_deref());
            let json = cmd.common.json;
            let sender = SmtpSender::new(account);
            let result = match compose(send_request(cmd), &config, account, &renderer)? {
                Composed::Plain(message) => sender.send(&message),
                Composed::Template {
                    message,
                    name,
                    context,
                } => sender.send_template(&renderer, &name, &context, message),
            };
            emit(&result, json)
        }
        CliCommand::List(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let result = MailboxClient::new(account).list(&cmd.folder, cmd.limit, cmd.unread);
            emit(&result, cmd.common.json)
        }
        CliCommand::Read(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let result = MailboxClient::new(account).read(&cmd.folder, &cmd.id);
            emit(&result, cmd.common.json)
        }
        CliCommand::Search(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let result = MailboxClient::new(account).search(&cmd.folder, &cmd.query, cmd.limit);
            emit(&result, cmd.common.json)
        }
        CliCommand::Delete(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let result = MailboxClient::new(account).delete(&cmd.folder, &cmd.id);
            if result.success {
                info!(folder = %cmd.folder, id = %cmd.id, "message deleted");
            }
            emit(&result, cmd.common.json)
        }
        CliCommand::Folders(cmd) => match cmd.command {
            FoldersCommand::List(common) => {
                let account = config.get_account(common.account.as_deref())?;
                emit(&MailboxClient::new(account).list_folders(), common.json)
            }
            FoldersCommand::Create(create) => {
                let account = config.get_account(create.common.account.as_deref())?;
                let result = MailboxClient::new(account).create_folder(&create.name);
                emit(&result, create.common.json)
            }
        },
        CliCommand::Presets(cmd) => match cmd.command {
            PresetsCommand::List(common) => {
                let result = OperationResult::ok(Payload::presets(config.get_all_presets()));
                emit(&result, common.json)
            }
            PresetsCommand::Show(show) => {
                let result = match config.get_message_preset(&show.name) {
                    Ok(preset) => OperationResult::ok(Payload::Preset {
                        name: show.name.clone(),
                        preset: Some(preset.clone()),
                    }),
                    Err(err) => OperationResult::failed(
                        Payload::Preset {
                            name: show.name.clone(),
                            preset: None,
                        },
                        &err,
                    ),
                };
                emit(&result, show.common.json)
            }
        },
        CliCommand::Recipients(cmd) => match cmd.command {
            RecipientsCommand::List(common) => {
                let result = OperationResult::ok(Payload::recipients(config.get_all_recipients()));
                emit(&result, common.json)
            }
        },
        CliCommand::Check(cmd) => {
            let account = config.get_account(cmd.common.account.as_deref())?;
            let result = MailboxClient::new(account).list(&cmd.folder, cmd.limit, true);
            if cmd.common.json {
                return emit(&result, true);
            }
            if !result.success {
                eprintln!(
                    "Error checking emails: {}",
                    result.error.as_deref().unwrap_or("Unknown error")
                );
                return Ok(exit_code(false));
            }
            println!("{}", format_unread_summary(&result));
            Ok(exit_code(true))
        }
    }
}

fn send_request(cmd: SendCmd) -> SendRequest {
    SendRequest {
        to: cmd.to,
        subject: cmd.subject,
        body: cmd.body,
        html: cmd.html,
        template: cmd.template,
        preset: cmd.preset,
        context: cmd.context,
        cc: cmd.cc,
        bcc: cmd.bcc,
        attachments: cmd.attachments,
    }
}
