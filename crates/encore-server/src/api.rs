use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use encore_shared::analytics::RevenueSummary;
use encore_shared::{
    NewSongRequest, PlayedStatus, RequestId, SavedSong, ScheduleStatus, ScheduleWindow,
    SongRequest, Tip, UserId,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lifecycle::LifecycleManager;
use crate::payment::{CheckoutCreated, CheckoutService, VerifyOutcome};

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: LifecycleManager,
    /// `None` when no payment provider is configured.
    pub checkout: Option<CheckoutService>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/schedule/status", get(schedule_status))
        .route("/requests", post(submit_request))
        .route("/requests/queue", get(public_queue))
        .route("/users/:user_id/requests", get(user_requests))
        .route("/users/:user_id/saved", get(list_saved).post(save_song))
        .route("/users/:user_id/saved/:saved_id", delete(delete_saved))
        .route("/payments/checkout", post(create_checkout))
        .route("/payments/verify", post(verify_checkout))
        .route("/admin/queue", get(admin_queue))
        .route("/admin/history", get(admin_history))
        .route("/admin/requests/:id/play", post(admin_mark_playing))
        .route("/admin/requests/:id/complete", post(admin_mark_completed))
        .route("/admin/requests/:id", delete(admin_delete_request))
        .route("/admin/analytics", get(admin_analytics))
        .route("/admin/online", get(admin_online))
        .route("/admin/schedule", get(admin_list_schedule).post(admin_add_window))
        .route(
            "/admin/schedule/:id",
            put(admin_toggle_window).delete(admin_delete_window),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// What the audience sees of the queue: no names or contact details.
#[derive(Debug, Serialize, Deserialize)]
struct QueueEntry {
    id: RequestId,
    song_name: String,
    artist_name: String,
    genre: Option<String>,
    tip_amount: Tip,
    played_status: PlayedStatus,
    created_at: DateTime<Utc>,
}

impl From<SongRequest> for QueueEntry {
    fn from(r: SongRequest) -> Self {
        Self {
            id: r.id,
            song_name: r.song_name,
            artist_name: r.artist_name,
            genre: r.genre,
            tip_amount: r.tip_amount,
            played_status: r.played_status,
            created_at: r.created_at,
        }
    }
}

#[derive(Deserialize)]
struct SaveSongBody {
    request_id: RequestId,
}

#[derive(Deserialize)]
struct CheckoutBody {
    song_request_id: RequestId,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct VerifyBody {
    session_id: String,
}

#[derive(Deserialize)]
struct NewWindowBody {
    day_of_week: u8,
    start_time: String,
    end_time: String,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
struct ToggleWindowBody {
    is_active: bool,
}

#[derive(Serialize)]
struct OnlineResponse {
    count: usize,
    user_ids: Vec<UserId>,
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn schedule_status(State(state): State<AppState>) -> Result<Json<ScheduleStatus>, ServerError> {
    Ok(Json(state.lifecycle.schedule_status().await?))
}

async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<NewSongRequest>,
) -> Result<(StatusCode, Json<SongRequest>), ServerError> {
    let request = state.lifecycle.submit(body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn public_queue(State(state): State<AppState>) -> Result<Json<Vec<QueueEntry>>, ServerError> {
    let queue = state.lifecycle.list_queue().await?;
    Ok(Json(queue.into_iter().map(QueueEntry::from).collect()))
}

async fn user_requests(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<SongRequest>>, ServerError> {
    Ok(Json(state.lifecycle.history_for_user(UserId(user_id)).await?))
}

async fn list_saved(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<SavedSong>>, ServerError> {
    Ok(Json(state.lifecycle.list_saved_songs(UserId(user_id)).await?))
}

async fn save_song(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SaveSongBody>,
) -> Result<(StatusCode, Json<SavedSong>), ServerError> {
    let saved = state
        .lifecycle
        .save_song(UserId(user_id), body.request_id)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn delete_saved(
    State(state): State<AppState>,
    Path((user_id, saved_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state
        .lifecycle
        .delete_saved_song(UserId(user_id), saved_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutCreated>, ServerError> {
    let checkout = state.checkout.as_ref().ok_or(ServerError::PaymentsDisabled)?;
    let created = checkout
        .create_payment(body.song_request_id, body.currency.as_deref())
        .await?;
    Ok(Json(created))
}

async fn verify_checkout(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyOutcome>, ServerError> {
    let checkout = state.checkout.as_ref().ok_or(ServerError::PaymentsDisabled)?;
    if body.session_id.trim().is_empty() {
        return Err(ServerError::BadRequest("session_id is required".into()));
    }
    Ok(Json(checkout.verify_payment(body.session_id.trim()).await?))
}

// ---------------------------------------------------------------------------
// Admin handlers
// ---------------------------------------------------------------------------

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

async fn admin_queue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SongRequest>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.list_queue().await?))
}

async fn admin_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SongRequest>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.list_history().await?))
}

async fn admin_mark_playing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SongRequest>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.mark_playing(RequestId(id)).await?))
}

async fn admin_mark_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SongRequest>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.mark_completed(RequestId(id)).await?))
}

async fn admin_delete_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    state.lifecycle.delete(RequestId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RevenueSummary>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.analytics().await?))
}

async fn admin_online(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OnlineResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let user_ids = state.lifecycle.online_requesters().await?;
    Ok(Json(OnlineResponse {
        count: user_ids.len(),
        user_ids,
    }))
}

async fn admin_list_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScheduleWindow>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.lifecycle.list_schedule_windows().await?))
}

async fn admin_add_window(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewWindowBody>,
) -> Result<(StatusCode, Json<ScheduleWindow>), ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let window = state
        .lifecycle
        .add_schedule_window(body.day_of_week, &body.start_time, &body.end_time, body.is_active)
        .await?;
    Ok((StatusCode::CREATED, Json(window)))
}

async fn admin_toggle_window(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleWindowBody>,
) -> Result<Json<ScheduleWindow>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(
        state
            .lifecycle
            .set_schedule_window_active(id, body.is_active)
            .await?,
    ))
}

async fn admin_delete_window(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    state.lifecycle.delete_schedule_window(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::lifecycle::tests::{friday_night, manager, ManualClock};
    use crate::payment::tests::FakeProvider;

    const TOKEN: &str = "test-admin-token";

    async fn app() -> Router {
        let lifecycle = manager(ManualClock::at(friday_night())).await;
        let config = ServerConfig {
            admin_token: Some(TOKEN.to_string()),
            ..ServerConfig::default()
        };
        let checkout = CheckoutService::new(
            Arc::new(FakeProvider::default()),
            lifecycle.clone(),
            "usd",
            "https://dj.example",
        );
        build_router(AppState {
            lifecycle,
            checkout: Some(checkout),
            config: Arc::new(config),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>, admin: bool) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if admin {
            builder = builder.header("authorization", format!("Bearer {TOKEN}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health() {
        let app = app().await;
        let (status, body) = call(&app, "GET", "/health", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn submit_play_complete_over_http() {
        let app = app().await;

        let (status, created) = call(
            &app,
            "POST",
            "/requests",
            Some(json!({
                "song_name": "Gasolina",
                "artist_name": "Daddy Yankee",
                "tip_amount": 5.0,
                "contact_handle": "@dy_fan"
            })),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["played_status"], "pending");
        assert_eq!(created["payment_status"], "pending");
        assert_eq!(created["tip_amount"], 5.0);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, queue) = call(&app, "GET", "/requests/queue", None, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue[0]["id"], id.as_str());
        assert!(queue[0].get("contact_handle").is_none());

        let play = format!("/admin/requests/{id}/play");
        let complete = format!("/admin/requests/{id}/complete");

        let (status, _) = call(&app, "POST", &complete, None, true).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, playing) = call(&app, "POST", &play, None, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(playing["played_status"], "playing");
        assert!(playing["played_at"].is_string());

        let (status, _) = call(&app, "POST", &complete, None, true).await;
        assert_eq!(status, StatusCode::OK);

        let (_, history) = call(&app, "GET", "/admin/history", None, true).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (status, body) = call(&app, "POST", &play, None, true).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("completed"));

        let (status, _) = call(&app, "DELETE", &format!("/admin/requests/{id}"), None, true).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", &format!("/admin/requests/{id}"), None, true).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_errors_are_unprocessable() {
        let app = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/requests",
            Some(json!({"song_name": "Song", "artist_name": "Artist", "tip_amount": 1.99})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn admin_requires_token() {
        let app = app().await;
        let (status, _) = call(&app, "GET", "/admin/queue", None, false).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "GET", "/admin/queue", None, true).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn closed_schedule_blocks_submission() {
        let app = app().await;
        let (_, windows) = call(&app, "GET", "/admin/schedule", None, true).await;
        let window_id = windows[0]["id"].as_str().unwrap().to_string();
        assert_eq!(windows[0]["start_time"], "20:00");

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/admin/schedule/{window_id}"),
            Some(json!({"is_active": false})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, schedule) = call(&app, "GET", "/schedule/status", None, false).await;
        assert_eq!(schedule["is_allowed"], false);

        let (status, body) = call(
            &app,
            "POST",
            "/requests",
            Some(json!({"song_name": "Song", "artist_name": "Artist", "tip_amount": 5.0})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], schedule["message"]);
    }

    #[tokio::test]
    async fn checkout_flow() {
        let app = app().await;
        let (_, created) = call(
            &app,
            "POST",
            "/requests",
            Some(json!({"song_name": "Song", "artist_name": "Artist", "tip_amount": 3.0})),
            false,
        )
        .await;

        let (status, checkout) = call(
            &app,
            "POST",
            "/payments/checkout",
            Some(json!({"song_request_id": created["id"]})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(checkout["url"].as_str().unwrap().starts_with("https://checkout.test/"));

        let (status, verified) = call(
            &app,
            "POST",
            "/payments/verify",
            Some(json!({"session_id": checkout["session_id"]})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["payment_status"], "unpaid");
        assert_eq!(verified["state"], "pending");
    }

    #[tokio::test]
    async fn saved_songs_over_http() {
        let app = app().await;
        let user = Uuid::new_v4();
        let (_, created) = call(
            &app,
            "POST",
            "/requests",
            Some(json!({
                "song_name": "Thriller",
                "artist_name": "Michael Jackson",
                "tip_amount": 10.0,
                "owner_user_id": user
            })),
            false,
        )
        .await;

        let (status, saved) = call(
            &app,
            "POST",
            &format!("/users/{user}/saved"),
            Some(json!({"request_id": created["id"]})),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, mine) = call(&app, "GET", &format!("/users/{user}/requests"), None, false).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let saved_id = saved["id"].as_str().unwrap();
        let (status, _) = call(
            &app,
            "DELETE",
            &format!("/users/{user}/saved/{saved_id}"),
            None,
            false,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, list) = call(&app, "GET", &format!("/users/{user}/saved"), None, false).await;
        assert!(list.as_array().unwrap().is_empty());
    }
}
