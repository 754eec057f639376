use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use leadboard_client::config::ClientConfig;
use leadboard_client::http::HttpLeadApi;
use leadboard_client::Dashboard;
use leadboard_core::api::{ApiError, LeadApi, MoveLeadRequest};
use leadboard_core::cancel::CancelToken;
use leadboard_core::drag::{DragOutcome, DropTarget};
use leadboard_core::search::{FilterState, ResultSource};
use leadboard_core::types::MoveResponse;

#[derive(Default)]
struct MockState {
    moves: Mutex<Vec<(String, Value)>>,
    searches: Mutex<Vec<Value>>,
}

type Shared = Arc<MockState>;

fn lead_json(id: &str, name: &str, column: &str) -> Value {
    json!({
        "id": id,
        "column_id": column,
        "name": name,
        "value": 1200.0,
        "created_at": "2026-03-10T12:00:00Z",
        "updated_at": "2026-03-10T12:00:00Z"
    })
}

fn board_json() -> Value {
    json!({
        "columns": [
            {
                "id": "new",
                "name": "New",
                "leads": [lead_json("L1", "Ana Silva", "new"), lead_json("L2", "Bruno", "new")]
            },
            { "id": "won", "name": "Won", "leads": [] }
        ],
        "account": { "id": "acc-1", "name": "Acme" }
    })
}

fn counts_json(total: u32) -> Value {
    json!({
        "total_pending": total,
        "today": 0,
        "overdue": 0,
        "has_tasks": total > 0,
        "has_overdue": false,
        "has_today": false
    })
}

async fn board(headers: HeaderMap) -> Response {
    let account = headers.get("x-account-id").and_then(|v| v.to_str().ok());
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if account != Some("acc-1") || auth != Some("Bearer secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }
    Json(board_json()).into_response()
}

async fn move_lead(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.moves.lock().unwrap().push((id.clone(), body.clone()));
    let column = body["column_id"].as_str().unwrap_or_default().to_string();
    if column == "gone" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "column not found" })),
        )
            .into_response();
    }
    Json(json!({
        "kind": "lead",
        "lead": lead_json(&id, "Ana Silva", &column),
        "position": body["position"]
    }))
    .into_response()
}

async fn search(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.searches.lock().unwrap().push(body.clone());
    if body["search"] == "slow" {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    let mut board = board_json();
    if body["search"] == "ana" {
        board["columns"][0]["leads"] = json!([lead_json("L1", "Ana Silva", "new")]);
    }
    Json(board).into_response()
}

async fn activity_counts(Path(id): Path<String>) -> Response {
    if id == "boom" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }
    Json(counts_json(3)).into_response()
}

async fn activity_counts_bulk(Json(body): Json<Value>) -> Response {
    let mut map = serde_json::Map::new();
    for id in body["lead_ids"].as_array().cloned().unwrap_or_default() {
        if let Some(id) = id.as_str() {
            map.insert(id.to_string(), counts_json(id.len() as u32));
        }
    }
    Json(Value::Object(map)).into_response()
}

async fn spawn_server() -> (String, Shared) {
    let state: Shared = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/board", get(board))
        .route("/api/board/search", post(search))
        .route("/api/leads/{id}/move", patch(move_lead))
        .route("/api/leads/{id}/activity-counts", get(activity_counts))
        .route("/api/leads/activity-counts", post(activity_counts_bulk))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api/", addr), state)
}

fn config(base_url: String) -> ClientConfig {
    ClientConfig {
        base_url,
        account_id: Some("acc-1".into()),
        api_token: Some("secret".into()),
        request_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fetch_board_sends_account_and_token() {
    let (url, _) = spawn_server().await;
    let api = HttpLeadApi::new(&config(url.clone())).unwrap();
    let board = api.fetch_board().await.unwrap();
    assert_eq!(board.columns.len(), 2);
    assert_eq!(board.lead_count(), 2);
    assert_eq!(board.account.unwrap().name, "Acme");

    let anonymous = HttpLeadApi::new(&ClientConfig {
        base_url: url,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        anonymous.fetch_board().await,
        Err(ApiError::Validation {
            status: 401,
            message: "unauthorized".into()
        })
    );
}

#[tokio::test]
async fn test_move_lead_round_trip_and_rejection() {
    let (url, state) = spawn_server().await;
    let api = HttpLeadApi::new(&config(url)).unwrap();

    let reply = api
        .move_lead(
            "lead 1",
            &MoveLeadRequest {
                column_id: "won".into(),
                position: 0,
            },
        )
        .await
        .unwrap();
    match reply {
        MoveResponse::Lead { lead, position } => {
            assert_eq!(lead.id, "lead 1");
            assert_eq!(lead.column_id, "won");
            assert_eq!(position, 0);
        }
        other => panic!("unexpected reply {:?}", other),
    }
    assert_eq!(state.moves.lock().unwrap()[0].0, "lead 1");

    let rejected = api
        .move_lead(
            "L1",
            &MoveLeadRequest {
                column_id: "gone".into(),
                position: 0,
            },
        )
        .await;
    assert_eq!(
        rejected,
        Err(ApiError::Validation {
            status: 422,
            message: "column not found".into()
        })
    );
}

#[tokio::test]
async fn test_search_is_aborted_by_cancel_token() {
    let (url, state) = spawn_server().await;
    let api = HttpLeadApi::new(&config(url)).unwrap();
    let request = FilterState {
        search: "slow".into(),
        ..Default::default()
    }
    .to_request(2);

    let token = CancelToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = api.search_board(&request, token).await;
    assert_eq!(result, Err(ApiError::Aborted));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(state.searches.lock().unwrap()[0]["search"], "slow");
}

#[tokio::test]
async fn test_activity_counts_single_bulk_and_server_error() {
    let (url, _) = spawn_server().await;
    let api = HttpLeadApi::new(&config(url)).unwrap();

    let counts = api.activity_counts("L1").await.unwrap();
    assert_eq!(counts.total_pending, 3);
    assert!(counts.has_tasks);

    let bulk = api
        .activity_counts_bulk(&["L1".to_string(), "L22".to_string()])
        .await
        .unwrap();
    assert_eq!(bulk["L1"].total_pending, 2);
    assert_eq!(bulk["L22"].total_pending, 3);

    assert_eq!(
        api.activity_counts("boom").await,
        Err(ApiError::Server {
            status: 500,
            message: "database unavailable".into()
        })
    );
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let api = HttpLeadApi::new(&config("http://127.0.0.1:1/api".into())).unwrap();
    assert!(matches!(api.fetch_board().await, Err(ApiError::Network(_))));
}

#[tokio::test]
async fn test_dashboard_drag_commit_and_search() {
    let (url, state) = spawn_server().await;
    let mut config = config(url);
    config.search.debounce_ms = 10;
    let dashboard = Dashboard::from_config(config).unwrap();
    dashboard.load().await.unwrap();
    assert!(dashboard.store.is_loaded());

    dashboard.drag.drag_start("L1").unwrap();
    let won = DropTarget::Column("won".into());
    assert!(dashboard.drag.drag_over(Some(&won)).unwrap());
    let outcome = dashboard.drag.drag_end(Some(&won)).await.unwrap();
    assert!(matches!(outcome, DragOutcome::Committed { .. }));
    assert_eq!(state.moves.lock().unwrap()[0].1["column_id"], "won");
    let placed = dashboard.store.snapshot();
    assert_eq!(placed.columns[1].leads[0].id, "L1");

    dashboard.search.submit(FilterState {
        search: "ana".into(),
        ..Default::default()
    });
    assert_eq!(dashboard.search.presentation().source, ResultSource::Local);

    let mut rx = dashboard.search.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.source == ResultSource::Remote),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(dashboard.search.remote_requests_sent(), 1);
}
