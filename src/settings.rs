use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::models::shortener::ProviderConfig;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen: String,
    /// Base URL of the verification landing page the short links redirect
    /// to, e.g. "https://linkgold.example".
    pub verify_base_url: String,
}

fn default_commission_bps() -> i64 {
    500
}

fn default_min_withdrawal() -> i64 {
    20_000
}

fn default_min_deposit() -> i64 {
    10_000
}

#[derive(Debug, Deserialize)]
pub struct Rewards {
    /// Referral commission in basis points (500 = 5%).
    #[serde(default = "default_commission_bps")]
    pub commission_bps: i64,
    #[serde(default = "default_min_withdrawal")]
    pub min_withdrawal: i64,
    #[serde(default = "default_min_deposit")]
    pub min_deposit: i64,
}

impl Default for Rewards {
    fn default() -> Self {
        Rewards {
            commission_bps: default_commission_bps(),
            min_withdrawal: default_min_withdrawal(),
            min_deposit: default_min_deposit(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Shortener {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub server: Server,
    #[serde(default)]
    pub rewards: Rewards,
    #[serde(default)]
    pub shortener: Shortener,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Settings::from_file("config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// A negative commission rate would turn referral credits into debits
    /// inside settlement, so refuse to start with one.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=10_000).contains(&self.rewards.commission_bps) {
            return Err(ConfigError::Message(format!(
                "rewards.commission_bps must be between 0 and 10000, got {}",
                self.rewards.commission_bps
            )));
        }
        if self.rewards.min_withdrawal <= 0 {
            return Err(ConfigError::Message(format!(
                "rewards.min_withdrawal must be positive, got {}",
                self.rewards.min_withdrawal
            )));
        }
        if self.rewards.min_deposit <= 0 {
            return Err(ConfigError::Message(format!(
                "rewards.min_deposit must be positive, got {}",
                self.rewards.min_deposit
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn try_parse(toml: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn parse(toml: &str) -> Settings {
        try_parse(toml).unwrap()
    }

    #[test]
    fn minimal_config_uses_reward_defaults() {
        let settings = parse(
            r#"
                [postgres]
                url = "postgres://localhost/linkgold"

                [server]
                listen = "0.0.0.0:8080"
                verify_base_url = "https://linkgold.example"
            "#,
        );

        assert_eq!(settings.rewards.commission_bps, 500);
        assert_eq!(settings.rewards.min_withdrawal, 20_000);
        assert_eq!(settings.rewards.min_deposit, 10_000);
        assert!(settings.shortener.providers.is_empty());
    }

    #[test]
    fn out_of_range_commission_is_rejected_at_load() {
        let base = r#"
            [postgres]
            url = "postgres://localhost/linkgold"

            [server]
            listen = "0.0.0.0:8080"
            verify_base_url = "https://linkgold.example"

            [rewards]
        "#;

        assert!(try_parse(&format!("{}commission_bps = -100", base)).is_err());
        assert!(try_parse(&format!("{}commission_bps = 20000", base)).is_err());
        assert!(try_parse(&format!("{}commission_bps = 10000", base)).is_ok());
        assert!(try_parse(&format!("{}min_withdrawal = 0", base)).is_err());
        assert!(try_parse(&format!("{}min_deposit = -1", base)).is_err());
    }

    #[test]
    fn providers_parse_with_per_provider_shapes() {
        let settings = parse(
            r#"
                [postgres]
                url = "postgres://localhost/linkgold"

                [server]
                listen = "0.0.0.0:8080"
                verify_base_url = "https://linkgold.example"

                [rewards]
                commission_bps = 300

                [[shortener.providers]]
                name = "link4m"
                endpoint = "https://link4m.co/api-shorten/v2"
                api_key = "k1"
                param_name = "api"

                [[shortener.providers]]
                name = "yeumoney"
                endpoint = "https://yeumoney.com/QL_api.php"
                api_key = "k2"
                extra_params = "format=json"

                [[shortener.providers]]
                name = "traffictot"
                endpoint = "https://services.traffictot.com/api/v1/shorten"
                api_key = "k3"
                json_post = true
            "#,
        );

        assert_eq!(settings.rewards.commission_bps, 300);
        assert_eq!(settings.shortener.providers.len(), 3);

        let link4m = &settings.shortener.providers[0];
        assert_eq!(link4m.param_name, "api");
        assert!(!link4m.json_post);

        let yeumoney = &settings.shortener.providers[1];
        // Falls back to the common default.
        assert_eq!(yeumoney.param_name, "token");
        assert_eq!(yeumoney.extra_params.as_deref(), Some("format=json"));

        assert!(settings.shortener.providers[2].json_post);
    }
}
