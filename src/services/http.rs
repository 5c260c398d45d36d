use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::deposits::DepositRequest;
use super::sessions::{Session, SessionStore};
use super::settlement::SettlementRequest;
use super::store::StoreRequest;
use super::tasks::TaskRequest;
use super::users::UserRequest;
use super::withdrawals::WithdrawalRequest;
use super::ServiceError;
use crate::models::deposits::NewDeposit;
use crate::models::submissions::VerificationPayload;
use crate::models::users::{NewUser, UserRole};
use crate::models::withdrawals::NewWithdrawal;

mod admin;

pub struct ServiceChannels {
    pub user_tx: mpsc::Sender<UserRequest>,
    pub task_tx: mpsc::Sender<TaskRequest>,
    pub settlement_tx: mpsc::Sender<SettlementRequest>,
    pub withdrawal_tx: mpsc::Sender<WithdrawalRequest>,
    pub deposit_tx: mpsc::Sender<DepositRequest>,
    pub store_tx: mpsc::Sender<StoreRequest>,
}

#[derive(Clone)]
struct AppState {
    user_tx: mpsc::Sender<UserRequest>,
    task_tx: mpsc::Sender<TaskRequest>,
    settlement_tx: mpsc::Sender<SettlementRequest>,
    withdrawal_tx: mpsc::Sender<WithdrawalRequest>,
    deposit_tx: mpsc::Sender<DepositRequest>,
    store_tx: mpsc::Sender<StoreRequest>,
    sessions: Arc<SessionStore>,
}

type ApiResponse = (StatusCode, Json<Value>);

fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: ServiceError) -> ApiResponse {
    let status = status_for(&error);

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("request failed: {}", error);
        return (
            status,
            Json(json!({"description": "Internal server error."})),
        );
    }

    (status, Json(json!({"description": error.to_string()})))
}

fn channel_error<E: std::fmt::Display>(e: E) -> ApiResponse {
    log::error!("service channel failure: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"description": "Internal server error."})),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiResponse> {
    let token = bearer_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(json!({"description": "Missing bearer token."})),
    ))?;

    state.sessions.get(token).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(json!({"description": "Session expired or unknown."})),
    ))
}

/// The role comes from the session, which was populated from the users table
/// at login. Nothing client-supplied can elevate it.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiResponse> {
    let session = require_session(state, headers)?;

    if session.role != UserRole::Admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"description": "Admin role required."})),
        ));
    }

    Ok(session)
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

async fn register(State(state): State<AppState>, Json(req): Json<NewUser>) -> ApiResponse {
    let (user_tx, user_rx) = oneshot::channel();

    if let Err(e) = state
        .user_tx
        .send(UserRequest::Register {
            new_user: req,
            response: user_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match user_rx.await {
        Ok(Ok(profile)) => (StatusCode::CREATED, Json(json!(profile))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginPayload>) -> ApiResponse {
    let (user_tx, user_rx) = oneshot::channel();

    if let Err(e) = state
        .user_tx
        .send(UserRequest::Login {
            email: req.email,
            password: req.password,
            response: user_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match user_rx.await {
        Ok(Ok((session, profile))) => (
            StatusCode::OK,
            Json(json!({"token": session.token, "profile": profile})),
        ),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (user_tx, user_rx) = oneshot::channel();
    if let Err(e) = state
        .user_tx
        .send(UserRequest::Logout {
            token: session.token,
            response: user_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match user_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"description": "Logged out."}))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (user_tx, user_rx) = oneshot::channel();
    if let Err(e) = state
        .user_tx
        .send(UserRequest::GetProfile {
            user_id: session.user_id,
            response: user_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match user_rx.await {
        Ok(Ok(profile)) => (StatusCode::OK, Json(json!(profile))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_tasks(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(response) = require_session(&state, &headers) {
        return response;
    }

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::ListActive { response: task_tx })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(tasks)) => (StatusCode::OK, Json(json!(tasks))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn start_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::StartTask {
            user_id: session.user_id,
            task_id,
            response: task_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(started)) => (StatusCode::CREATED, Json(json!(started))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn verify_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<VerificationPayload>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::VerifySubmission {
            user_id: session.user_id,
            submission_id,
            code: req.code,
            response: task_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(json!(outcome))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_my_submissions(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::ListMySubmissions {
            user_id: session.user_id,
            response: task_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(submissions)) => (StatusCode::OK, Json(json!(submissions))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn create_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewWithdrawal>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();
    if let Err(e) = state
        .withdrawal_tx
        .send(WithdrawalRequest::Create {
            user_id: session.user_id,
            new_withdrawal: req,
            response: withdrawal_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match withdrawal_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::CREATED, Json(json!(withdrawal))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_my_withdrawals(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();
    if let Err(e) = state
        .withdrawal_tx
        .send(WithdrawalRequest::ListForUser {
            user_id: session.user_id,
            response: withdrawal_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match withdrawal_rx.await {
        Ok(Ok(withdrawals)) => (StatusCode::OK, Json(json!(withdrawals))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn create_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewDeposit>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (deposit_tx, deposit_rx) = oneshot::channel();
    if let Err(e) = state
        .deposit_tx
        .send(DepositRequest::Create {
            user_id: session.user_id,
            new_deposit: req,
            response: deposit_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match deposit_rx.await {
        Ok(Ok(deposit)) => (StatusCode::CREATED, Json(json!(deposit))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_my_deposits(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (deposit_tx, deposit_rx) = oneshot::channel();
    if let Err(e) = state
        .deposit_tx
        .send(DepositRequest::ListForUser {
            user_id: session.user_id,
            response: deposit_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match deposit_rx.await {
        Ok(Ok(deposits)) => (StatusCode::OK, Json(json!(deposits))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_store_items(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(response) = require_session(&state, &headers) {
        return response;
    }

    let (store_tx, store_rx) = oneshot::channel();
    if let Err(e) = state
        .store_tx
        .send(StoreRequest::ListItems { response: store_tx })
        .await
    {
        return channel_error(e);
    }

    match store_rx.await {
        Ok(Ok(items)) => (StatusCode::OK, Json(json!(items))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn purchase_store_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (store_tx, store_rx) = oneshot::channel();
    if let Err(e) = state
        .store_tx
        .send(StoreRequest::Purchase {
            user_id: session.user_id,
            item_id,
            response: store_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match store_rx.await {
        Ok(Ok(purchase)) => (StatusCode::CREATED, Json(json!(purchase))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_my_purchases(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let (store_tx, store_rx) = oneshot::channel();
    if let Err(e) = state
        .store_tx
        .send(StoreRequest::ListPurchases {
            user_id: session.user_id,
            response: store_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match store_rx.await {
        Ok(Ok(purchases)) => (StatusCode::OK, Json(json!(purchases))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

pub async fn start_http_server(
    listen: &str,
    channels: ServiceChannels,
    sessions: Arc<SessionStore>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        user_tx: channels.user_tx,
        task_tx: channels.task_tx,
        settlement_tx: channels.settlement_tx,
        withdrawal_tx: channels.withdrawal_tx,
        deposit_tx: channels.deposit_tx,
        store_tx: channels.store_tx,
        sessions,
    };

    let app = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
        .route("/me/submissions", get(list_my_submissions))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}/start", post(start_task))
        .route("/submissions/{id}/verify", post(verify_submission))
        .route("/withdrawals", post(create_withdrawal).get(list_my_withdrawals))
        .route("/deposits", post(create_deposit).get(list_my_deposits))
        .route("/store/items", get(list_store_items))
        .route("/store/items/{id}/purchase", post(purchase_store_item))
        .route("/store/purchases", get(list_my_purchases))
        .merge(admin::router())
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    println!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_categories() {
        assert_eq!(
            status_for(&ServiceError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&ServiceError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ServiceError::Conflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ServiceError::Database("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&ServiceError::ExternalService(
                "a".into(),
                "b".into(),
                "c".into()
            )),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let (status, Json(body)) =
            error_response(ServiceError::Database("password_hash mismatch".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["description"], "Internal server error.");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
