use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::sync::oneshot;

use super::{channel_error, error_response, require_admin, ApiResponse, AppState};
use crate::models::tasks::{NewTask, TaskUpdate};
use crate::services::deposits::DepositRequest;
use crate::services::settlement::SettlementRequest;
use crate::services::tasks::TaskRequest;
use crate::services::users::UserRequest;
use crate::services::withdrawals::WithdrawalRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/tasks", post(create_task).get(list_all_tasks))
        .route("/admin/tasks/{id}", put(update_task))
        .route("/admin/submissions", get(list_pending_submissions))
        .route("/admin/submissions/{id}/approve", post(approve_submission))
        .route("/admin/submissions/{id}/reject", post(reject_submission))
        .route("/admin/withdrawals", get(list_pending_withdrawals))
        .route("/admin/withdrawals/{id}/approve", post(approve_withdrawal))
        .route("/admin/withdrawals/{id}/reject", post(reject_withdrawal))
        .route("/admin/deposits", get(list_pending_deposits))
        .route("/admin/deposits/{id}/approve", post(approve_deposit))
        .route("/admin/deposits/{id}/reject", post(reject_deposit))
        .route("/admin/users", get(list_users))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewTask>,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::CreateTask {
            new_task: req,
            response: task_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(task)) => (StatusCode::CREATED, Json(json!(task))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<TaskUpdate>,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::UpdateTask {
            task_id,
            update: req,
            response: task_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match task_rx.await {
        Ok(Ok(task)) => (StatusCode::OK, Json(json!(task))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_all_tasks(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::ListAllTasks { response: task_tx })
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

async fn list_pending_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (task_tx, task_rx) = oneshot::channel();
    if let Err(e) = state
        .task_tx
        .send(TaskRequest::ListPendingSubmissions { response: task_tx })
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

/// Approving a submission is exactly a settlement run; re-approving an
/// already settled one comes back as a 409.
async fn approve_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (settlement_tx, settlement_rx) = oneshot::channel();
    if let Err(e) = state
        .settlement_tx
        .send(SettlementRequest::Settle {
            submission_id,
            response: settlement_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match settlement_rx.await {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(json!(outcome))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn reject_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (settlement_tx, settlement_rx) = oneshot::channel();
    if let Err(e) = state
        .settlement_tx
        .send(SettlementRequest::Reject {
            submission_id,
            response: settlement_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match settlement_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"description": "Rejected."}))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_pending_withdrawals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();
    if let Err(e) = state
        .withdrawal_tx
        .send(WithdrawalRequest::ListPending {
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

async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();
    if let Err(e) = state
        .withdrawal_tx
        .send(WithdrawalRequest::Approve {
            withdrawal_id,
            response: withdrawal_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match withdrawal_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::OK, Json(json!(withdrawal))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();
    if let Err(e) = state
        .withdrawal_tx
        .send(WithdrawalRequest::Reject {
            withdrawal_id,
            response: withdrawal_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match withdrawal_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::OK, Json(json!(withdrawal))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_pending_deposits(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (deposit_tx, deposit_rx) = oneshot::channel();
    if let Err(e) = state
        .deposit_tx
        .send(DepositRequest::ListPending {
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

async fn approve_deposit(
    State(state): State<AppState>,
    Path(deposit_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (deposit_tx, deposit_rx) = oneshot::channel();
    if let Err(e) = state
        .deposit_tx
        .send(DepositRequest::Approve {
            deposit_id,
            response: deposit_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match deposit_rx.await {
        Ok(Ok(deposit)) => (StatusCode::OK, Json(json!(deposit))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn reject_deposit(
    State(state): State<AppState>,
    Path(deposit_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (deposit_tx, deposit_rx) = oneshot::channel();
    if let Err(e) = state
        .deposit_tx
        .send(DepositRequest::Reject {
            deposit_id,
            response: deposit_tx,
        })
        .await
    {
        return channel_error(e);
    }

    match deposit_rx.await {
        Ok(Ok(deposit)) => (StatusCode::OK, Json(json!(deposit))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (user_tx, user_rx) = oneshot::channel();
    if let Err(e) = state
        .user_tx
        .send(UserRequest::ListUsers { response: user_tx })
        .await
    {
        return channel_error(e);
    }

    match user_rx.await {
        Ok(Ok(users)) => (StatusCode::OK, Json(json!(users))),
        Ok(Err(error)) => error_response(error),
        Err(e) => channel_error(e),
    }
}
