use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::submissions::SettlementOutcome;
use crate::repositories::submissions::{SettlementError, SubmissionRepository};

pub enum SettlementRequest {
    /// Approve a submission and apply the reward (plus referral commission)
    /// exactly once. Both the admin approve path and auto-task verification
    /// funnel through here.
    Settle {
        submission_id: String,
        response: oneshot::Sender<Result<SettlementOutcome, ServiceError>>,
    },
    Reject {
        submission_id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct SettlementRequestHandler {
    repository: SubmissionRepository,
    commission_bps: i64,
}

fn map_settlement_error(error: SettlementError) -> ServiceError {
    match error {
        SettlementError::SubmissionNotFound(id) => {
            ServiceError::NotFound(format!("submission {}", id))
        }
        SettlementError::AlreadySettled(id) => {
            ServiceError::Conflict(format!("submission {} has already been settled", id))
        }
        SettlementError::TaskUnavailable(id) => {
            ServiceError::Conflict(format!("task {} is missing or inactive", id))
        }
        SettlementError::Database(e) => ServiceError::Database(e.to_string()),
    }
}

impl SettlementRequestHandler {
    pub fn new(sql_conn: PgPool, commission_bps: i64) -> Self {
        let repository = SubmissionRepository::new(sql_conn);

        SettlementRequestHandler {
            repository,
            commission_bps,
        }
    }

    async fn settle(&self, submission_id: &str) -> Result<SettlementOutcome, ServiceError> {
        let outcome = self
            .repository
            .settle(submission_id, self.commission_bps)
            .await
            .map_err(|e| {
                // Never silently swallowed: every settlement failure is an
                // operator-visible event.
                match &e {
                    SettlementError::AlreadySettled(_) => {
                        log::warn!("settlement refused: {}", e)
                    }
                    _ => log::error!("settlement of {} failed: {}", submission_id, e),
                }
                map_settlement_error(e)
            })?;

        log::info!(
            "settled submission {}: {} Xu to user {}, {} Xu commission to {:?}",
            outcome.submission_id,
            outcome.reward,
            outcome.user_id,
            outcome.commission,
            outcome.referrer_id
        );

        Ok(outcome)
    }

    async fn reject(&self, submission_id: &str) -> Result<(), ServiceError> {
        self.repository
            .reject(submission_id)
            .await
            .map_err(map_settlement_error)
    }
}

#[async_trait]
impl RequestHandler<SettlementRequest> for SettlementRequestHandler {
    async fn handle_request(&self, request: SettlementRequest) {
        match request {
            SettlementRequest::Settle {
                submission_id,
                response,
            } => {
                let result = self.settle(&submission_id).await;
                let _ = response.send(result);
            }
            SettlementRequest::Reject {
                submission_id,
                response,
            } => {
                let result = self.reject(&submission_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct SettlementService;

impl SettlementService {
    pub fn new() -> Self {
        SettlementService {}
    }
}

#[async_trait]
impl Service<SettlementRequest, SettlementRequestHandler> for SettlementService {}
