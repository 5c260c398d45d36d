use crate::models::shortener::ProviderConfig;

use anyhow::{anyhow, bail};
use reqwest;
use serde_json::json;

/// HTTP client for the shortening APIs. Two wire shapes exist in the wild:
/// a GET with the key in a query parameter (name varies per provider, some
/// want extra parameters) and a JSON POST. The response is JSON either way,
/// with the short link under one of a few known field names.
pub struct ShortenerApi {
    client: reqwest::Client,
}

impl ShortenerApi {
    pub fn new() -> Self {
        ShortenerApi {
            client: reqwest::Client::new(),
        }
    }

    pub async fn shorten(
        &self,
        config: &ProviderConfig,
        destination: &str,
    ) -> Result<String, anyhow::Error> {
        let response = if config.json_post {
            self.client
                .post(&config.endpoint)
                .json(&json!({
                    "key": config.api_key,
                    "url": destination
                }))
                .send()
                .await?
                .text()
                .await?
        } else {
            let mut query = vec![
                (config.param_name.clone(), config.api_key.clone()),
                ("url".to_string(), destination.to_string()),
            ];
            query.extend(extra_pairs(config.extra_params.as_deref()));

            self.client
                .get(&config.endpoint)
                .query(&query)
                .send()
                .await?
                .text()
                .await?
        };

        let response_json: serde_json::Value = serde_json::from_str(&response)
            .map_err(|_| anyhow!("{}: non-JSON response", config.name))?;

        match extract_short_url(&response_json) {
            Some(short_url) => Ok(short_url),
            None => bail!("{}: bad response format.", config.name),
        }
    }
}

/// The providers disagree on the response field: `shortenedUrl`, `url`, or
/// a nested `data.url`. Take whichever is present.
fn extract_short_url(value: &serde_json::Value) -> Option<String> {
    let candidate = value
        .get("shortenedUrl")
        .or_else(|| value.get("url"))
        .or_else(|| value.get("data").and_then(|data| data.get("url")));

    candidate
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extra_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Vec::new(),
    };

    raw.split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_short_url_from_known_shapes() {
        let flat = json!({"shortenedUrl": "https://s.example/abc"});
        assert_eq!(
            extract_short_url(&flat).as_deref(),
            Some("https://s.example/abc")
        );

        let plain = json!({"status": "ok", "url": "https://s.example/def"});
        assert_eq!(
            extract_short_url(&plain).as_deref(),
            Some("https://s.example/def")
        );

        let nested = json!({"data": {"url": "https://s.example/ghi"}});
        assert_eq!(
            extract_short_url(&nested).as_deref(),
            Some("https://s.example/ghi")
        );
    }

    #[test]
    fn rejects_responses_without_a_link() {
        assert_eq!(extract_short_url(&json!({"status": "error"})), None);
        assert_eq!(extract_short_url(&json!({"url": ""})), None);
        assert_eq!(extract_short_url(&json!({"url": 42})), None);
    }

    #[test]
    fn extra_params_parse_as_query_pairs() {
        assert_eq!(
            extra_pairs(Some("format=json")),
            vec![("format".to_string(), "json".to_string())]
        );
        assert_eq!(
            extra_pairs(Some("a=1&b=2")),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        assert!(extra_pairs(Some("")).is_empty());
        assert!(extra_pairs(None).is_empty());
        assert!(extra_pairs(Some("=orphan")).is_empty());
    }
}
