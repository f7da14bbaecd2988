use std::io::Write;

use anyhow::{Context, Result};
use changelens_core::{Notification, TicketId};
use changelens_infer::AskRequest;
use serde::Serialize;

use crate::cli::{AnalyzeArgs, AskArgs, Commands, NotificationsArgs, ProjectArgs, VersionsArgs};
use crate::session::Session;

#[derive(Debug, Serialize)]
struct NotificationsOutput {
    unread: usize,
    notifications: Vec<Notification>,
}

pub async fn run_command(session: &Session, command: &Commands, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Notifications(args) => list_notifications(session, args, out).await,
        Commands::Versions(args) => list_versions(session, args, out).await,
        Commands::View(args) => show_change_view(session, args.ticket_id, out).await,
        Commands::Analyze(args) => analyze_descriptions(session, args, out).await,
        Commands::Ask(args) => ask_assistant(session, args, out).await,
        Commands::Project(args) => show_project(session, args, out).await,
    }
}

async fn list_notifications(
    session: &Session,
    args: &NotificationsArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let cache = session.notifications();
    cache
        .get_notifications(args.refresh)
        .await
        .context("failed to load notifications")?;
    if let Some(ticket_id) = args.mark_read {
        cache.mark_read(ticket_id);
    }

    let output = NotificationsOutput {
        unread: cache.unread_count(),
        notifications: cache.cached_notifications().unwrap_or_default(),
    };
    write_json(out, &output)
}

async fn list_versions(session: &Session, args: &VersionsArgs, out: &mut dyn Write) -> Result<()> {
    let versions = session
        .versions()
        .get_versions(args.ticket_id, args.refresh)
        .await?;
    write_json(out, &versions)
}

async fn show_change_view(session: &Session, ticket_id: TicketId, out: &mut dyn Write) -> Result<()> {
    let notification = find_notification(session, ticket_id).await;
    let view = session
        .orchestrator()
        .build_change_view(&notification)
        .await;
    session.notifications().mark_read(ticket_id);
    write_json(out, &view)
}

async fn analyze_descriptions(
    session: &Session,
    args: &AnalyzeArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let analysis = session
        .analysis()
        .analyze(&args.old_description, &args.new_description)
        .await;
    write_json(out, &analysis)
}

async fn ask_assistant(session: &Session, args: &AskArgs, out: &mut dyn Write) -> Result<()> {
    let assistant = session
        .assistant()
        .context("assistant is not configured for this session")?;
    let mut request = AskRequest::new(args.query.as_str(), args.project.as_str());
    request.num_results = args.num_results.max(1);

    let response = assistant
        .ask(&request)
        .await
        .context("assistant request failed")?;
    write_json(out, &response)
}

async fn show_project(session: &Session, args: &ProjectArgs, out: &mut dyn Write) -> Result<()> {
    let project = session
        .source()
        .project(args.project_id)
        .await
        .with_context(|| format!("failed to load project {}", args.project_id))?;

    if !args.tickets {
        return write_json(out, &project);
    }

    let tickets = session
        .source()
        .project_tickets(args.project_id)
        .await
        .with_context(|| format!("failed to load tickets of project {}", args.project_id))?;
    write_json(
        out,
        &serde_json::json!({
            "project": project,
            "tickets": tickets,
        }),
    )
}

/// Cached notification for `ticket_id`, or a bare one when the list is
/// unavailable or does not mention the ticket.
async fn find_notification(session: &Session, ticket_id: TicketId) -> Notification {
    let listed = match session.notifications().get_notifications(false).await {
        Ok(notifications) => notifications
            .into_iter()
            .find(|notification| notification.ticket_id == ticket_id),
        Err(err) => {
            tracing::warn!(error = %err, "notifications unavailable, opening bare ticket view");
            None
        }
    };

    listed.unwrap_or_else(|| Notification {
        ticket_id,
        ticket_name: format!("Ticket {ticket_id}"),
        description: String::new(),
        read: false,
    })
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to encode output")?;
    writeln!(out).context("failed to write output")?;
    Ok(())
}
