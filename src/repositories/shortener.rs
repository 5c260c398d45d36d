use crate::models::shortener::ProviderConfig;

use std::collections::HashMap;

use anyhow::bail;

mod api;

pub use api::ShortenerApi;

/// Front door for every configured link-shortening provider. Providers are
/// looked up by name; settlement logic never touches this module.
pub struct ShortenerRepository {
    api: ShortenerApi,
    providers: HashMap<String, ProviderConfig>,
}

impl ShortenerRepository {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.name.clone(), provider))
            .collect();

        ShortenerRepository {
            api: ShortenerApi::new(),
            providers,
        }
    }

    pub async fn shorten(
        &self,
        provider: &str,
        destination: &str,
    ) -> Result<String, anyhow::Error> {
        let config = match self.providers.get(provider) {
            Some(config) => config,
            None => bail!("UnknownProvider: {}", provider),
        };

        self.api.shorten(config, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            endpoint: format!("https://{}.example/api", name),
            api_key: "key".to_string(),
            param_name: "token".to_string(),
            extra_params: None,
            json_post: false,
        }
    }

    #[test]
    fn providers_are_indexed_by_name() {
        let repository = ShortenerRepository::new(vec![config("link4m"), config("yeumoney")]);

        assert!(repository.providers.contains_key("link4m"));
        assert!(repository.providers.contains_key("yeumoney"));
        assert!(!repository.providers.contains_key("linktot"));
    }
}
