use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use changelens_store::{
    HttpTicketSource, NotificationCache, StoreError, TicketSource, VersionStore,
};
use serde_json::{Value, json};

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve stub backend");
    });
    format!("http://{addr}")
}

fn backend_router(version_hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/tickets/{id}/versions",
            get(move |Path(id): Path<i64>| {
                let version_hits = Arc::clone(&version_hits);
                async move {
                    version_hits.fetch_add(1, Ordering::SeqCst);
                    if id == 404 {
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    Ok(Json(json!([
                        {"id": 1, "name": "Login", "description": "A", "status": "OPEN",
                         "creator": "ana", "project": "Portal", "timestamp": "t1"},
                        {"id": 2, "name": "Login", "description": "B", "status": "REVIEW",
                         "creator": "ana", "project": "Portal", "timestamp": "t2"}
                    ])))
                }
            }),
        )
        .route(
            "/modifications/latest",
            get(|| async {
                Json(json!([
                    {"ticketId": 1, "ticketName": "Login", "description": "status changed"},
                    {"ticketId": 2, "ticketName": "Dashboard", "description": "description changed"}
                ]))
            }),
        )
        .route(
            "/projects/{id}",
            get(|Path(id): Path<i64>| async move {
                Json(json!({"id": id, "name": "Portal"}))
            }),
        )
        .route(
            "/projects/{id}/tickets",
            get(|Path(_id): Path<i64>| async {
                Json(json!([
                    {"id": 1, "name": "Login", "description": "B", "status": "REVIEW",
                     "creator": "ana", "project": "Portal"}
                ]))
            }),
        )
        .route(
            "/tickets/{id}",
            get(|Path(id): Path<i64>| async move {
                Json(json!({"id": id, "name": "Login", "description": "B", "status": "REVIEW",
                            "creator": "ana", "project": "Portal"}))
            }),
        )
}

#[tokio::test]
async fn version_store_sorts_and_caches_http_histories() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_backend(backend_router(Arc::clone(&hits))).await;
    let source = HttpTicketSource::new(&format!("{base_url}/"), Duration::from_secs(5))
        .expect("build source");
    assert_eq!(source.base_url(), base_url);

    let store = VersionStore::new(Arc::new(source));

    let versions = store.get_versions(7, false).await.expect("fetch versions");
    assert_eq!(
        versions.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![2, 1]
    );
    assert_eq!(versions[0].status, "REVIEW");

    store.get_versions(7, false).await.expect("cached versions");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_surface_as_version_fetch_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_backend(backend_router(hits)).await;
    let store = VersionStore::new(Arc::new(
        HttpTicketSource::new(&base_url, Duration::from_secs(5)).expect("build source"),
    ));

    let err = store
        .get_versions(404, false)
        .await
        .expect_err("500 should fail");

    assert_eq!(err.ticket_id, 404);
    assert!(matches!(err.source, StoreError::Request(_)));
    assert!(store.cached_versions(404).is_none());
}

#[tokio::test]
async fn notifications_default_to_unread() {
    let base_url = spawn_backend(backend_router(Arc::new(AtomicUsize::new(0)))).await;
    let cache = NotificationCache::new(Arc::new(
        HttpTicketSource::new(&base_url, Duration::from_secs(5)).expect("build source"),
    ));

    let notifications = cache.get_notifications(false).await.expect("notifications");

    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|n| !n.read));
    assert_eq!(cache.unread_count(), 2);
}

#[tokio::test]
async fn collaborator_reads_decode_projects_and_tickets() {
    let base_url = spawn_backend(backend_router(Arc::new(AtomicUsize::new(0)))).await;
    let source = HttpTicketSource::new(&base_url, Duration::from_secs(5)).expect("build source");

    let project = source.project(3).await.expect("project");
    assert_eq!(project.id, 3);
    assert_eq!(project.name, "Portal");
    assert!(project.description.is_none());

    let tickets = source.project_tickets(3).await.expect("project tickets");
    assert_eq!(tickets.len(), 1);

    let ticket = source.ticket(1).await.expect("ticket");
    assert_eq!(ticket.status, "REVIEW");

    let round_trip: Value = serde_json::to_value(&ticket).expect("serialize ticket");
    assert_eq!(round_trip["creator"], "ana");
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let source = HttpTicketSource::new(&format!("http://{addr}"), Duration::from_secs(2))
        .expect("build source");

    let result = source.latest_notifications().await;
    assert!(matches!(result, Err(StoreError::Request(_))));
}

#[tokio::test]
async fn undecodable_body_is_a_request_error() {
    let router = Router::new().route(
        "/modifications/latest",
        get(|| async { Json(json!({"not": "a list"})) }),
    );
    let base_url = spawn_backend(router).await;
    let source = HttpTicketSource::new(&base_url, Duration::from_secs(2)).expect("build source");

    let result = source.latest_notifications().await;

    assert!(matches!(result, Err(StoreError::Request(ref err)) if err.is_decode()));
}
