use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::withdrawals::{NewWithdrawal, Withdrawal, WithdrawalMethod};
use crate::repositories::withdrawals::WithdrawalRepository;
use crate::repositories::LedgerError;

pub enum WithdrawalRequest {
    Create {
        user_id: String,
        new_withdrawal: NewWithdrawal,
        response: oneshot::Sender<Result<Withdrawal, ServiceError>>,
    },
    ListForUser {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Withdrawal>, ServiceError>>,
    },
    ListPending {
        response: oneshot::Sender<Result<Vec<Withdrawal>, ServiceError>>,
    },
    Approve {
        withdrawal_id: String,
        response: oneshot::Sender<Result<Withdrawal, ServiceError>>,
    },
    Reject {
        withdrawal_id: String,
        response: oneshot::Sender<Result<Withdrawal, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct WithdrawalRequestHandler {
    repository: WithdrawalRepository,
    min_amount: i64,
}

pub(super) fn map_ledger_error(source: &str, error: LedgerError) -> ServiceError {
    match error {
        LedgerError::InsufficientFunds => {
            ServiceError::Validation("insufficient available balance".to_string())
        }
        LedgerError::NotFound(id) => ServiceError::NotFound(format!("request {}", id)),
        LedgerError::NotPending(id) => {
            ServiceError::Conflict(format!("request {} is no longer pending", id))
        }
        LedgerError::Database(e) => ServiceError::Repository(source.to_string(), e.to_string()),
    }
}

fn validate_withdrawal(new_withdrawal: &NewWithdrawal, min_amount: i64) -> Result<(), String> {
    if new_withdrawal.amount < min_amount {
        return Err(format!("minimum withdrawal is {} Xu", min_amount));
    }
    if WithdrawalMethod::parse(&new_withdrawal.method).is_none() {
        return Err(format!(
            "unknown withdrawal method '{}'",
            new_withdrawal.method
        ));
    }
    if new_withdrawal.details.trim().is_empty() {
        return Err("payout details must not be empty".to_string());
    }
    Ok(())
}

impl WithdrawalRequestHandler {
    pub fn new(sql_conn: PgPool, min_amount: i64) -> Self {
        let repository = WithdrawalRepository::new(sql_conn);

        WithdrawalRequestHandler {
            repository,
            min_amount,
        }
    }

    async fn create(
        &self,
        user_id: &str,
        new_withdrawal: NewWithdrawal,
    ) -> Result<Withdrawal, ServiceError> {
        validate_withdrawal(&new_withdrawal, self.min_amount).map_err(ServiceError::Validation)?;

        let withdrawal = self
            .repository
            .create_request(
                user_id,
                new_withdrawal.amount,
                &new_withdrawal.method,
                new_withdrawal.details.trim(),
            )
            .await
            .map_err(|e| map_ledger_error("Withdrawal", e))?;

        log::info!(
            "withdrawal {} requested: {} Xu reserved for user {}",
            withdrawal.id,
            withdrawal.amount,
            user_id
        );
        Ok(withdrawal)
    }

    async fn approve(&self, withdrawal_id: &str) -> Result<Withdrawal, ServiceError> {
        let withdrawal = self
            .repository
            .approve(withdrawal_id)
            .await
            .map_err(|e| map_ledger_error("Withdrawal", e))?;

        log::info!(
            "withdrawal {} approved: {} Xu paid out to user {}",
            withdrawal.id,
            withdrawal.amount,
            withdrawal.user_id
        );
        Ok(withdrawal)
    }

    async fn reject(&self, withdrawal_id: &str) -> Result<Withdrawal, ServiceError> {
        let withdrawal = self
            .repository
            .reject(withdrawal_id)
            .await
            .map_err(|e| map_ledger_error("Withdrawal", e))?;

        log::info!(
            "withdrawal {} rejected: {} Xu released back to user {}",
            withdrawal.id,
            withdrawal.amount,
            withdrawal.user_id
        );
        Ok(withdrawal)
    }
}

#[async_trait]
impl RequestHandler<WithdrawalRequest> for WithdrawalRequestHandler {
    async fn handle_request(&self, request: WithdrawalRequest) {
        match request {
            WithdrawalRequest::Create {
                user_id,
                new_withdrawal,
                response,
            } => {
                let result = self.create(&user_id, new_withdrawal).await;
                let _ = response.send(result);
            }
            WithdrawalRequest::ListForUser { user_id, response } => {
                let result = self
                    .repository
                    .list_for_user(&user_id)
                    .await
                    .map_err(|e| map_ledger_error("Withdrawal", e));
                let _ = response.send(result);
            }
            WithdrawalRequest::ListPending { response } => {
                let result = self
                    .repository
                    .list_pending()
                    .await
                    .map_err(|e| map_ledger_error("Withdrawal", e));
                let _ = response.send(result);
            }
            WithdrawalRequest::Approve {
                withdrawal_id,
                response,
            } => {
                let result = self.approve(&withdrawal_id).await;
                let _ = response.send(result);
            }
            WithdrawalRequest::Reject {
                withdrawal_id,
                response,
            } => {
                let result = self.reject(&withdrawal_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn new() -> Self {
        WithdrawalService {}
    }
}

#[async_trait]
impl Service<WithdrawalRequest, WithdrawalRequestHandler> for WithdrawalService {}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 20_000;

    fn request(amount: i64, method: &str) -> NewWithdrawal {
        NewWithdrawal {
            amount,
            method: method.to_string(),
            details: "VCB - 9337117930 - HOANG MAI ANH VU".to_string(),
        }
    }

    #[test]
    fn amounts_below_minimum_are_rejected_before_any_mutation() {
        assert!(validate_withdrawal(&request(19_999, "bank"), MIN).is_err());
        assert!(validate_withdrawal(&request(20_000, "bank"), MIN).is_ok());
    }

    #[test]
    fn unknown_methods_are_rejected() {
        assert!(validate_withdrawal(&request(50_000, "paypal"), MIN).is_err());
        assert!(validate_withdrawal(&request(50_000, "gamecard"), MIN).is_ok());
    }

    #[test]
    fn empty_payout_details_are_rejected() {
        let mut bad = request(50_000, "bank");
        bad.details = "   ".to_string();
        assert!(validate_withdrawal(&bad, MIN).is_err());
    }
}
