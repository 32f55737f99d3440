use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::catalog;
use super::flow::{FlowError, FlowState};
use super::session::{FunnelService, SessionError, SessionId, SessionStore, SessionStoreError};

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub option: usize,
}

/// Router exposing the landing catalog, quiz sessions, and result pages.
pub fn funnel_router<S>(service: Arc<FunnelService<S>>) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route("/api/v1/blogs", get(catalog_handler::<S>))
        .route("/api/v1/results/:slug", get(result_handler::<S>))
        .route("/api/v1/quiz/sessions", post(start_handler::<S>))
        .route(
            "/api/v1/quiz/sessions/:session_id",
            get(session_handler::<S>).delete(dispose_handler::<S>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/select",
            post(select_handler::<S>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/advance",
            post(advance_handler::<S>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/retreat",
            post(retreat_handler::<S>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/summary",
            get(summary_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn catalog_handler<S>(State(service): State<Arc<FunnelService<S>>>) -> Response
where
    S: SessionStore + 'static,
{
    match service.catalog().await {
        Ok(landing) => (StatusCode::OK, Json(landing)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn result_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(slug): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.result(&slug).await {
        Ok(Some(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "リクエストされたキャラクターが見つかりませんでした。",
                "title": catalog::title_from_slug(&slug),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn start_handler<S>(State(service): State<Arc<FunnelService<S>>>) -> Response
where
    S: SessionStore + 'static,
{
    match service.start().await {
        Ok(session) => {
            let status = match session.flow.state() {
                FlowState::Errored { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::CREATED,
            };
            (status, Json(session.view())).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn session_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.get(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn select_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectRequest>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.select(&SessionId(session_id), request.option) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn advance_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.advance(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn retreat_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.retreat(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn summary_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.summary(&SessionId(session_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dispose_handler<S>(
    State(service): State<Arc<FunnelService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.dispose(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::Flow(FlowError::NoAnswerSelected)
        | SessionError::Flow(FlowError::OptionOutOfRange { .. })
        | SessionError::Flow(FlowError::AtFirstQuestion) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Flow(FlowError::TransitionPending)
        | SessionError::Flow(FlowError::Completed)
        | SessionError::Flow(FlowError::NotReady)
        | SessionError::Store(SessionStoreError::Conflict) => StatusCode::CONFLICT,
        SessionError::Store(SessionStoreError::NotFound) => StatusCode::NOT_FOUND,
        SessionError::DataLoad(_) => StatusCode::BAD_GATEWAY,
        SessionError::Store(SessionStoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
