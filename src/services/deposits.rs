use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::withdrawals::map_ledger_error;
use super::{RequestHandler, Service, ServiceError};
use crate::models::deposits::{Deposit, NewDeposit};
use crate::repositories::deposits::DepositRepository;

pub enum DepositRequest {
    Create {
        user_id: String,
        new_deposit: NewDeposit,
        response: oneshot::Sender<Result<Deposit, ServiceError>>,
    },
    ListForUser {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Deposit>, ServiceError>>,
    },
    ListPending {
        response: oneshot::Sender<Result<Vec<Deposit>, ServiceError>>,
    },
    Approve {
        deposit_id: String,
        response: oneshot::Sender<Result<Deposit, ServiceError>>,
    },
    Reject {
        deposit_id: String,
        response: oneshot::Sender<Result<Deposit, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct DepositRequestHandler {
    repository: DepositRepository,
    min_amount: i64,
}

impl DepositRequestHandler {
    pub fn new(sql_conn: PgPool, min_amount: i64) -> Self {
        let repository = DepositRepository::new(sql_conn);

        DepositRequestHandler {
            repository,
            min_amount,
        }
    }

    async fn create(&self, user_id: &str, new_deposit: NewDeposit) -> Result<Deposit, ServiceError> {
        if new_deposit.amount < self.min_amount {
            return Err(ServiceError::Validation(format!(
                "minimum deposit is {} Xu",
                self.min_amount
            )));
        }

        let deposit = self
            .repository
            .create_request(user_id, new_deposit.amount)
            .await
            .map_err(|e| map_ledger_error("Deposit", e))?;

        log::info!(
            "deposit {} requested: {} Xu for user {}",
            deposit.id,
            deposit.amount,
            user_id
        );
        Ok(deposit)
    }

    async fn approve(&self, deposit_id: &str) -> Result<Deposit, ServiceError> {
        let deposit = self
            .repository
            .approve(deposit_id)
            .await
            .map_err(|e| map_ledger_error("Deposit", e))?;

        log::info!(
            "deposit {} approved: {} Xu credited to user {}",
            deposit.id,
            deposit.amount,
            deposit.user_id
        );
        Ok(deposit)
    }

    async fn reject(&self, deposit_id: &str) -> Result<Deposit, ServiceError> {
        let deposit = self
            .repository
            .reject(deposit_id)
            .await
            .map_err(|e| map_ledger_error("Deposit", e))?;

        log::info!("deposit {} rejected", deposit.id);
        Ok(deposit)
    }
}

#[async_trait]
impl RequestHandler<DepositRequest> for DepositRequestHandler {
    async fn handle_request(&self, request: DepositRequest) {
        match request {
            DepositRequest::Create {
                user_id,
                new_deposit,
                response,
            } => {
                let result = self.create(&user_id, new_deposit).await;
                let _ = response.send(result);
            }
            DepositRequest::ListForUser { user_id, response } => {
                let result = self
                    .repository
                    .list_for_user(&user_id)
                    .await
                    .map_err(|e| map_ledger_error("Deposit", e));
                let _ = response.send(result);
            }
            DepositRequest::ListPending { response } => {
                let result = self
                    .repository
                    .list_pending()
                    .await
                    .map_err(|e| map_ledger_error("Deposit", e));
                let _ = response.send(result);
            }
            DepositRequest::Approve {
                deposit_id,
                response,
            } => {
                let result = self.approve(&deposit_id).await;
                let _ = response.send(result);
            }
            DepositRequest::Reject {
                deposit_id,
                response,
            } => {
                let result = self.reject(&deposit_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct DepositService;

impl DepositService {
    pub fn new() -> Self {
        DepositService {}
    }
}

#[async_trait]
impl Service<DepositRequest, DepositRequestHandler> for DepositService {}
