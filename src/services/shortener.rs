use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::shortener::ProviderConfig;
use crate::repositories::shortener::ShortenerRepository;

pub enum ShortenerRequest {
    Shorten {
        provider: String,
        destination: String,
        response: oneshot::Sender<Result<String, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ShortenerRequestHandler {
    repository: Arc<ShortenerRepository>,
}

impl ShortenerRequestHandler {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        let repository = Arc::new(ShortenerRepository::new(providers));

        ShortenerRequestHandler { repository }
    }

    async fn shorten(&self, provider: &str, destination: &str) -> Result<String, ServiceError> {
        self.repository
            .shorten(provider, destination)
            .await
            .map_err(|e| {
                log::warn!("shortening via {} failed: {}", provider, e);
                ServiceError::ExternalService(
                    "ShortenerService".to_string(),
                    provider.to_string(),
                    e.to_string(),
                )
            })
    }
}

#[async_trait]
impl RequestHandler<ShortenerRequest> for ShortenerRequestHandler {
    async fn handle_request(&self, request: ShortenerRequest) {
        match request {
            ShortenerRequest::Shorten {
                provider,
                destination,
                response,
            } => {
                let result = self.shorten(&provider, &destination).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct ShortenerService;

impl ShortenerService {
    pub fn new() -> Self {
        ShortenerService {}
    }
}

#[async_trait]
impl Service<ShortenerRequest, ShortenerRequestHandler> for ShortenerService {}
