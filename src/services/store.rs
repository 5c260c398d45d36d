use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::withdrawals::map_ledger_error;
use super::{RequestHandler, Service, ServiceError};
use crate::models::store::{Purchase, StoreItem};
use crate::repositories::store::StoreRepository;

pub enum StoreRequest {
    ListItems {
        response: oneshot::Sender<Result<Vec<StoreItem>, ServiceError>>,
    },
    Purchase {
        user_id: String,
        item_id: String,
        response: oneshot::Sender<Result<Purchase, ServiceError>>,
    },
    ListPurchases {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Purchase>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct StoreRequestHandler {
    repository: StoreRepository,
}

impl StoreRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = StoreRepository::new(sql_conn);

        StoreRequestHandler { repository }
    }

    async fn purchase(&self, user_id: &str, item_id: &str) -> Result<Purchase, ServiceError> {
        let purchase = self
            .repository
            .purchase(user_id, item_id)
            .await
            .map_err(|e| map_ledger_error("Store", e))?;

        log::info!(
            "user {} bought item {} for {} Xu",
            user_id,
            item_id,
            purchase.price
        );
        Ok(purchase)
    }
}

#[async_trait]
impl RequestHandler<StoreRequest> for StoreRequestHandler {
    async fn handle_request(&self, request: StoreRequest) {
        match request {
            StoreRequest::ListItems { response } => {
                let result = self
                    .repository
                    .list_items()
                    .await
                    .map_err(|e| map_ledger_error("Store", e));
                let _ = response.send(result);
            }
            StoreRequest::Purchase {
                user_id,
                item_id,
                response,
            } => {
                let result = self.purchase(&user_id, &item_id).await;
                let _ = response.send(result);
            }
            StoreRequest::ListPurchases { user_id, response } => {
                let result = self
                    .repository
                    .list_purchases(&user_id)
                    .await
                    .map_err(|e| map_ledger_error("Store", e));
                let _ = response.send(result);
            }
        }
    }
}

pub struct StoreService;

impl StoreService {
    pub fn new() -> Self {
        StoreService {}
    }
}

#[async_trait]
impl Service<StoreRequest, StoreRequestHandler> for StoreService {}
