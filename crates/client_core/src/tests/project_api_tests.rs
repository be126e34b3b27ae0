use super::*;
use std::{sync::Mutex, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode as HttpStatus,
    routing::delete,
    Router,
};
use shared::domain::FormBoxId;
use tokio::net::TcpListener;

use crate::surface::EditForm;

#[derive(Default)]
struct RefreshCounter {
    refreshes: Mutex<u32>,
}

impl RefreshCounter {
    fn count(&self) -> u32 {
        *self.refreshes.lock().expect("refresh lock")
    }
}

impl FormSurface for RefreshCounter {
    fn mount(&self, _form_box_id: &FormBoxId, _form: &EditForm) {}

    fn collapse(&self, _form_box_id: &FormBoxId) {}

    fn reveal(&self, _form_box_id: &FormBoxId, _delay: Duration) {}

    fn clear_errors(&self, _form_box_id: &FormBoxId) {}

    fn show_errors(&self, _form_box_id: &FormBoxId, _errors: &[String]) {}

    fn refresh(&self) {
        *self.refreshes.lock().expect("refresh lock") += 1;
    }
}

#[derive(Clone, Default)]
struct DeleteServerState {
    deleted: Arc<Mutex<Vec<String>>>,
}

async fn handle_delete_sprint(
    State(state): State<DeleteServerState>,
    Path(sprint_id): Path<i64>,
) -> HttpStatus {
    state
        .deleted
        .lock()
        .expect("deleted lock")
        .push(format!("sprint-{sprint_id}"));
    HttpStatus::OK
}

async fn handle_delete_event(
    State(state): State<DeleteServerState>,
    Path(event_id): Path<i64>,
) -> HttpStatus {
    state
        .deleted
        .lock()
        .expect("deleted lock")
        .push(format!("event-{event_id}"));
    HttpStatus::FORBIDDEN
}

async fn spawn_delete_server() -> (String, DeleteServerState) {
    let state = DeleteServerState::default();
    let app = Router::new()
        .route("/delete-sprint/:sprint_id", delete(handle_delete_sprint))
        .route("/delete-event/:event_id", delete(handle_delete_event))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

#[test]
fn error_body_splits_into_one_message_per_line() {
    assert_eq!(
        parse_error_lines("Name is required\r\nDates overlap another sprint\n\n"),
        vec![
            "Name is required".to_string(),
            "Dates overlap another sprint".to_string(),
        ]
    );
    assert!(parse_error_lines("").is_empty());
}

#[test]
fn error_lines_keep_their_own_indentation() {
    assert_eq!(
        parse_error_lines("Dates invalid:\r\n  end before start\r\n   \r\n"),
        vec![
            "Dates invalid:".to_string(),
            "  end before start".to_string(),
        ]
    );
}

#[test]
fn trailing_slash_is_trimmed_from_endpoint() {
    assert_eq!(
        ProjectApi::new("http://planner.local/api/").endpoint(),
        "http://planner.local/api"
    );
}

#[tokio::test]
async fn deletes_hit_their_endpoints_and_refresh_regardless_of_status() {
    let (endpoint, server) = spawn_delete_server().await;
    let surface = Arc::new(RefreshCounter::default());
    let actions = PageActions::new(ProjectApi::new(&endpoint), surface.clone());

    actions.delete_sprint(SprintId(4)).await;
    actions.delete_event(EventId(11)).await;

    assert_eq!(
        *server.deleted.lock().expect("deleted lock"),
        vec!["sprint-4".to_string(), "event-11".to_string()]
    );
    assert_eq!(surface.count(), 2);
}

#[tokio::test]
async fn delete_reports_raw_status() {
    let (endpoint, _server) = spawn_delete_server().await;
    let api = ProjectApi::new(endpoint);

    assert_eq!(
        api.delete_event(EventId(2)).await.expect("delete"),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn unreachable_server_still_refreshes_page() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let surface = Arc::new(RefreshCounter::default());
    let actions = PageActions::new(ProjectApi::new(format!("http://{addr}")), surface.clone());

    actions.delete_event(EventId(1)).await;

    assert_eq!(surface.count(), 1);
}
