use std::sync::Arc;

use changelens_config::{AnalysisProviderKind, ensure_workspace_config};
use changelens_core::{Notification, Project, Ticket, Version};
use changelens_infer::{AnalysisClient, HeuristicAnalysisProvider};
use changelens_store::MemoryTicketSource;
use changelensd::cli::{
    AnalyzeArgs, Commands, NotificationsArgs, ProjectArgs, VersionsArgs, ViewArgs,
};
use changelensd::commands::run_command;
use changelensd::session::{Session, SessionOverrides};
use serde_json::Value;

fn version(id: i64, description: &str) -> Version {
    Version {
        id,
        name: "Login".to_owned(),
        description: description.to_owned(),
        status: "OPEN".to_owned(),
        timestamp: Some(format!("2024-01-0{id}T00:00:00Z")),
        ..Version::default()
    }
}

fn notification(ticket_id: i64) -> Notification {
    Notification {
        ticket_id,
        ticket_name: "Login".to_owned(),
        description: "Ticket updated".to_owned(),
        read: false,
    }
}

fn memory_session() -> (Arc<MemoryTicketSource>, Session) {
    let source = Arc::new(
        MemoryTicketSource::new()
            .with_versions(7, vec![version(1, "A"), version(2, "B")])
            .with_notifications(vec![notification(7), notification(8)])
            .with_project(
                Project {
                    id: 1,
                    name: "Portal".to_owned(),
                    description: None,
                },
                vec![Ticket {
                    id: 7,
                    name: "Login".to_owned(),
                    description: "B".to_owned(),
                    status: "OPEN".to_owned(),
                    creator: "dana".to_owned(),
                    project: "Portal".to_owned(),
                }],
            ),
    );
    let session = Session::with_components(
        source.clone(),
        AnalysisClient::heuristic_only(HeuristicAnalysisProvider::default()),
    );
    (source, session)
}

async fn run_json(session: &Session, command: Commands) -> Value {
    let mut out = Vec::new();
    run_command(session, &command, &mut out)
        .await
        .expect("run command");
    serde_json::from_slice(&out).expect("command output is json")
}

#[test]
fn session_builds_from_fresh_workspace_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = ensure_workspace_config(temp.path()).expect("write default config");

    let session = Session::from_config(
        &config,
        SessionOverrides {
            analysis_provider: Some(AnalysisProviderKind::Heuristic),
            ..SessionOverrides::default()
        },
    )
    .expect("build session");

    assert_eq!(session.analysis().provider_name(), "heuristic");
    assert!(session.assistant().is_some());
}

#[tokio::test]
async fn view_command_marks_notification_read() {
    let (_source, session) = memory_session();

    let view = run_json(&session, Commands::View(ViewArgs { ticket_id: 7 })).await;

    assert_eq!(view["phase"], "ready");
    assert_eq!(view["notification"]["ticketName"], "Login");
    assert_eq!(view["analysis"]["degraded"], true);
    assert_eq!(session.notifications().unread_count(), 1);
}

#[tokio::test]
async fn view_command_falls_back_to_bare_notification() {
    let (_source, session) = memory_session();

    let view = run_json(&session, Commands::View(ViewArgs { ticket_id: 99 })).await;

    assert_eq!(view["notification"]["ticketName"], "Ticket 99");
    assert_eq!(view["versions"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn notifications_command_reports_unread_count() {
    let (_source, session) = memory_session();

    let listed = run_json(
        &session,
        Commands::Notifications(NotificationsArgs {
            refresh: false,
            mark_read: Some(8),
        }),
    )
    .await;

    assert_eq!(listed["unread"], 1);
    assert_eq!(listed["notifications"][1]["read"], true);
}

#[tokio::test]
async fn versions_command_prints_most_recent_first() {
    let (source, session) = memory_session();

    let versions = run_json(
        &session,
        Commands::Versions(VersionsArgs {
            ticket_id: 7,
            refresh: false,
        }),
    )
    .await;
    let ids: Vec<_> = versions
        .as_array()
        .expect("version list")
        .iter()
        .map(|version| version["id"].as_i64().expect("id"))
        .collect();

    assert_eq!(ids, vec![2, 1]);
    assert_eq!(source.call_counts().versions, 1);
}

#[tokio::test]
async fn invalidate_ticket_forces_refetch() {
    let (source, session) = memory_session();

    session.versions().get_versions(7, false).await.expect("first fetch");
    session.versions().get_versions(7, false).await.expect("cached fetch");
    assert_eq!(source.call_counts().versions, 1);

    session.invalidate_ticket(7);
    session.versions().get_versions(7, false).await.expect("refetch");
    assert_eq!(source.call_counts().versions, 2);
}

#[tokio::test]
async fn analyze_command_uses_heuristic_when_configured() {
    let (_source, session) = memory_session();

    let analysis = run_json(
        &session,
        Commands::Analyze(AnalyzeArgs {
            old_description: "A".to_owned(),
            new_description: "B".to_owned(),
        }),
    )
    .await;

    assert_eq!(analysis["source"], "heuristic_fallback");
    assert_eq!(analysis["result"]["effort_estimation"]["effort_level"], "Medium");
}

#[tokio::test]
async fn project_command_lists_tickets() {
    let (_source, session) = memory_session();

    let project = run_json(
        &session,
        Commands::Project(ProjectArgs {
            project_id: 1,
            tickets: true,
        }),
    )
    .await;

    assert_eq!(project["project"]["name"], "Portal");
    assert_eq!(project["tickets"][0]["id"], 7);
}
