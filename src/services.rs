use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::settings::Settings;

mod deposits;
mod http;
mod sessions;
mod settlement;
mod shortener;
mod store;
mod tasks;
mod users;
mod withdrawals;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (task_tx, mut task_rx) = mpsc::channel(512);
    let (settlement_tx, mut settlement_rx) = mpsc::channel(512);
    let (shortener_tx, mut shortener_rx) = mpsc::channel(512);
    let (withdrawal_tx, mut withdrawal_rx) = mpsc::channel(512);
    let (deposit_tx, mut deposit_rx) = mpsc::channel(512);
    let (store_tx, mut store_rx) = mpsc::channel(512);

    let session_store = Arc::new(sessions::SessionStore::new());

    let mut user_service = users::UserService::new();
    let mut task_service = tasks::TaskService::new();
    let mut settlement_service = settlement::SettlementService::new();
    let mut shortener_service = shortener::ShortenerService::new();
    let mut withdrawal_service = withdrawals::WithdrawalService::new();
    let mut deposit_service = deposits::DepositService::new();
    let mut store_service = store::StoreService::new();

    println!("[*] Starting user service.");
    let user_pool_clone = pool.clone();
    let user_sessions = session_store.clone();
    tokio::spawn(async move {
        user_service
            .run(
                users::UserRequestHandler::new(user_pool_clone, user_sessions),
                &mut user_rx,
            )
            .await;
    });

    println!("[*] Starting settlement service.");
    let settlement_pool_clone = pool.clone();
    let commission_bps = settings.rewards.commission_bps;
    tokio::spawn(async move {
        settlement_service
            .run(
                settlement::SettlementRequestHandler::new(settlement_pool_clone, commission_bps),
                &mut settlement_rx,
            )
            .await;
    });

    println!("[*] Starting shortener service.");
    let shortener_providers = settings.shortener.providers.clone();
    tokio::spawn(async move {
        shortener_service
            .run(
                shortener::ShortenerRequestHandler::new(shortener_providers),
                &mut shortener_rx,
            )
            .await;
    });

    println!("[*] Starting task service.");
    let task_pool_clone = pool.clone();
    let task_settlement_tx = settlement_tx.clone();
    let task_shortener_tx = shortener_tx.clone();
    let verify_base_url = settings.server.verify_base_url.clone();
    tokio::spawn(async move {
        task_service
            .run(
                tasks::TaskRequestHandler::new(
                    task_pool_clone,
                    task_settlement_tx,
                    task_shortener_tx,
                    verify_base_url,
                ),
                &mut task_rx,
            )
            .await;
    });

    println!("[*] Starting withdrawal service.");
    let withdrawal_pool_clone = pool.clone();
    let min_withdrawal = settings.rewards.min_withdrawal;
    tokio::spawn(async move {
        withdrawal_service
            .run(
                withdrawals::WithdrawalRequestHandler::new(withdrawal_pool_clone, min_withdrawal),
                &mut withdrawal_rx,
            )
            .await;
    });

    println!("[*] Starting deposit service.");
    let deposit_pool_clone = pool.clone();
    let min_deposit = settings.rewards.min_deposit;
    tokio::spawn(async move {
        deposit_service
            .run(
                deposits::DepositRequestHandler::new(deposit_pool_clone, min_deposit),
                &mut deposit_rx,
            )
            .await;
    });

    println!("[*] Starting store service.");
    let store_pool_clone = pool.clone();
    tokio::spawn(async move {
        store_service
            .run(
                store::StoreRequestHandler::new(store_pool_clone),
                &mut store_rx,
            )
            .await;
    });

    println!("[*] Starting HTTP server.");
    let channels = http::ServiceChannels {
        user_tx,
        task_tx,
        settlement_tx,
        withdrawal_tx,
        deposit_tx,
        store_tx,
    };
    http::start_http_server(&settings.server.listen, channels, session_store).await?;

    Ok(())
}
