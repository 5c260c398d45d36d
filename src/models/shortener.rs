use serde::Deserialize;

fn default_param_name() -> String {
    "token".to_string()
}

/// One link-shortening provider from the config file. The provider APIs only
/// differ in how the key is passed (query parameter name, optional extra
/// parameters, or a JSON POST body), so a single config shape covers all of
/// them.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_param_name")]
    pub param_name: String,
    /// Extra query parameters, raw "k=v&k2=v2" form.
    #[serde(default)]
    pub extra_params: Option<String>,
    /// Providers like traffictot take a JSON POST instead of a GET.
    #[serde(default)]
    pub json_post: bool,
}
