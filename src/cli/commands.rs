//! Command execution.
//!
//! SOAP commands log in first, then run against [`SoapClient`]. Token
//! commands (and `user me`) use [`RestClient`] and need `MANTIS_API_TOKEN`.

use std::fs::File;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use super::output::{guess_mime_type, print_json};
use super::{
    Cli, Command, FilterCommand, IssueCommand, NoteCommand, ProjectCommand, SearchArgs,
    TokenCommand, UserCommand, VersionCommand, VersionFields,
};
use crate::config::Config;
use crate::error::MantisError;
use crate::models::{FilterSearchData, IssueNoteData, ProjectVersionData};
use crate::rest_client::RestClient;
use crate::soap_client::{CallContext, SoapClient};
use crate::transport::Transport;

/// Runs a parsed command line and prints its result.
///
/// The command is cancelled on Ctrl-C or when the `--deadline` passes.
///
/// # Errors
///
/// Returns the command's error, with secrets removed from the message.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let name = cli.command.name();
    let ctx = CallContext::new().with_span(tracing::info_span!("command", name));

    let interrupt = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                ctx.cancel();
            }
        })
    };

    let deadline = cli.deadline();
    let result = match tokio::time::timeout(deadline, dispatch(&cli.command, &config, &ctx)).await
    {
        Ok(result) => result,
        Err(_) => {
            ctx.cancel();
            Err(MantisError::timeout(deadline, name))
        }
    };
    interrupt.abort();

    match result {
        Ok(output) => {
            print_json(&output)?;
            Ok(())
        }
        Err(e) => {
            let mut sanitized = e.sanitized_display(config.password());
            if let Some(token) = config.api_token() {
                sanitized = MantisError::sanitize_message(&sanitized, token);
            }
            tracing::error!(error = %sanitized, command = name, "Command failed");
            Err(anyhow::anyhow!("{} failed: {}", name, sanitized))
        }
    }
}

async fn dispatch(
    command: &Command,
    config: &Config,
    ctx: &CallContext,
) -> Result<Value, MantisError> {
    if command.uses_rest() {
        let client = RestClient::new(config)?;
        return execute_rest(command, &client).await;
    }

    if let Command::Ping = command {
        let mut client = SoapClient::new(config)?;
        let version = client.version(ctx).await?;
        let user = client.login(ctx).await?;
        return Ok(json!({ "version": version, "user": user }));
    }

    let client = SoapClient::connect(config, ctx).await?;
    execute(command, &client, ctx).await
}

/// Runs a SOAP command against a logged-in client and returns its output.
///
/// # Errors
///
/// Returns `MantisError::Validation` for commands that are not SOAP
/// commands, or any error from the underlying calls.
pub async fn execute<T: Transport>(
    command: &Command,
    client: &SoapClient<T>,
    ctx: &CallContext,
) -> Result<Value, MantisError> {
    match command {
        Command::Issue(cmd) => issue(cmd, client, ctx).await,
        Command::Note(NoteCommand::Add { issue_id, text }) => {
            let reporter = client
                .user()
                .cloned()
                .ok_or_else(|| MantisError::validation("adding a note requires a logged-in user"))?;
            let note = IssueNoteData::new(reporter, text.join(" "));
            let id = client.issue_note_add(ctx, *issue_id, note).await?;
            Ok(json!({ "issue_id": issue_id, "note_id": id }))
        }
        Command::Project(ProjectCommand::List) => {
            to_json(&client.projects_get_user_accessible(ctx).await?)
        }
        Command::Project(ProjectCommand::Issues { project_id, page }) => to_json(
            &client
                .project_get_issues(ctx, *project_id, page.page, page.per_page)
                .await?,
        ),
        Command::Version(cmd) => version(cmd, client, ctx).await,
        Command::User(UserCommand::List { project, access }) => {
            to_json(&client.project_get_users(ctx, *project, *access).await?)
        }
        Command::Filter(FilterCommand::List { project }) => {
            to_json(&client.filter_get(ctx, *project).await?)
        }
        Command::Filter(FilterCommand::Issues {
            project_id,
            filter_id,
            page,
        }) => to_json(
            &client
                .filter_get_issues(ctx, *project_id, *filter_id, page.page, page.per_page)
                .await?,
        ),
        Command::Search(args) => {
            let filter = search_filter(args);
            to_json(
                &client
                    .filter_search_issues(ctx, filter, args.page.page, args.page.per_page)
                    .await?,
            )
        }
        Command::Token(_) | Command::User(UserCommand::Me) | Command::Ping => Err(
            MantisError::validation(format!("'{}' is not a SOAP command", command.name())),
        ),
    }
}

async fn issue<T: Transport>(
    command: &IssueCommand,
    client: &SoapClient<T>,
    ctx: &CallContext,
) -> Result<Value, MantisError> {
    match command {
        IssueCommand::Exists { issue_id } => {
            let exists = client.issue_exists(ctx, *issue_id).await?;
            Ok(json!({ "issue_id": issue_id, "exists": exists }))
        }
        IssueCommand::Get { issue_id } => to_json(&client.issue_get(ctx, *issue_id).await?),
        IssueCommand::Monitors { issue_id } => {
            to_json(&client.issue_get(ctx, *issue_id).await?.monitors)
        }
        IssueCommand::Attachments { issue_id } => {
            to_json(&client.issue_get(ctx, *issue_id).await?.attachments)
        }
        IssueCommand::Download { issue_id } => {
            let issue = client.issue_get(ctx, *issue_id).await?;
            let links: Vec<Value> = issue
                .attachments
                .iter()
                .map(|a| json!({ "filename": a.filename, "download_url": a.download_url }))
                .collect();
            Ok(Value::Array(links))
        }
        IssueCommand::Attach { issue_id, files } => {
            let issue = client.issue_get(ctx, *issue_id).await?;
            let mut results = Vec::with_capacity(files.len());
            for path in files {
                let name = file_name(path)?;
                if let Some(existing) = issue.find_attachment(&name) {
                    tracing::info!(issue_id, file = %name, "Already attached, skipping");
                    results.push(json!({ "file": name, "id": existing.id, "skipped": true }));
                    continue;
                }

                let file = File::open(path).map_err(MantisError::Attachment)?;
                let id = client
                    .issue_attachment_add(ctx, *issue_id, name.clone(), guess_mime_type(path), file)
                    .await?;
                results.push(json!({ "file": name, "id": id, "skipped": false }));
            }
            Ok(Value::Array(results))
        }
        IssueCommand::Status {
            status_id,
            issue_ids,
        } => to_json(&client.issue_set_status(ctx, *status_id, issue_ids).await?),
        IssueCommand::AddMonitor { issue_id, users } => {
            to_json(&client.issue_add_monitors(ctx, *issue_id, users).await?)
        }
        IssueCommand::Delete { issue_id } => {
            let deleted = client.issue_delete(ctx, *issue_id).await?;
            Ok(json!({ "issue_id": issue_id, "deleted": deleted }))
        }
    }
}

async fn version<T: Transport>(
    command: &VersionCommand,
    client: &SoapClient<T>,
    ctx: &CallContext,
) -> Result<Value, MantisError> {
    match command {
        VersionCommand::List { project_id } => {
            to_json(&client.project_versions_list(ctx, *project_id).await?)
        }
        VersionCommand::Add {
            project_id,
            name,
            fields,
        } => {
            let mut data = ProjectVersionData::new(*project_id, name.trim());
            apply_version_fields(&mut data, fields);
            let id = client.project_version_add(ctx, data).await?;
            Ok(json!({ "version_id": id }))
        }
        VersionCommand::Update {
            version_id,
            name,
            fields,
        } => {
            let mut data = client
                .project_version_find(ctx, *version_id)
                .await?
                .ok_or_else(|| {
                    MantisError::validation(format!("version {} not found", version_id))
                })?;
            if let Some(name) = name {
                data.name = Some(name.trim().to_string());
            }
            apply_version_fields(&mut data, fields);
            let updated = client
                .project_version_update(ctx, *version_id, data.clone())
                .await?;
            Ok(json!({ "updated": updated, "version": data }))
        }
        VersionCommand::Delete { version_id } => {
            let deleted = client.project_version_delete(ctx, *version_id).await?;
            Ok(json!({ "version_id": version_id, "deleted": deleted }))
        }
    }
}

async fn execute_rest(command: &Command, client: &RestClient) -> Result<Value, MantisError> {
    match command {
        Command::Token(TokenCommand::Create { name }) => to_json(&client.create_token(name).await?),
        Command::Token(TokenCommand::Revoke { token_id }) => {
            client.revoke_token(*token_id).await?;
            Ok(json!({ "token_id": token_id, "revoked": true }))
        }
        Command::User(UserCommand::Me) => to_json(&client.current_user().await?),
        other => Err(MantisError::validation(format!(
            "'{}' is not a REST command",
            other.name()
        ))),
    }
}

/// Empty description leaves the current one in place; flags always apply.
fn apply_version_fields(data: &mut ProjectVersionData, fields: &VersionFields) {
    if let Some(description) = fields.description.as_deref().filter(|d| !d.is_empty()) {
        data.description = Some(description.to_string());
    }
    if let Some(date) = fields.date {
        data.date_order = date;
    }
    data.released = Some(fields.released);
    data.obsolete = Some(fields.obsolete);
}

fn search_filter(args: &SearchArgs) -> FilterSearchData {
    FilterSearchData {
        project_id: args.projects.clone(),
        search: args.text.clone().filter(|t| !t.trim().is_empty()),
        category: args.categories.clone(),
        status_id: args.statuses.clone(),
        hide_status_id: args.hide_statuses.clone(),
        handler_id: args.handlers.clone(),
        reporter_id: args.reporters.clone(),
        sort: args.sort.clone(),
        sort_direction: args.direction.clone(),
        ..Default::default()
    }
}

fn file_name(path: &Path) -> Result<String, MantisError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| MantisError::validation(format!("not a file path: {}", path.display())))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, MantisError> {
    serde_json::to_value(value).map_err(MantisError::Serialization)
}
