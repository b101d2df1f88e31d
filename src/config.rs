use serde::Deserialize;
use time::UtcOffset;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub credits: CreditsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request deadline enforced by the router
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Apply pending migrations at startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditsConfig {
    /// Offset from UTC, in minutes, of the calendar used for the monthly reset
    #[serde(default)]
    pub reset_utc_offset_minutes: i16,
}

impl CreditsConfig {
    pub fn reset_offset(&self) -> anyhow::Result<UtcOffset> {
        let minutes = i32::from(self.reset_utc_offset_minutes);
        UtcOffset::from_whole_seconds(minutes * 60).map_err(|e| {
            anyhow::anyhow!(
                "credits.reset_utc_offset_minutes = {} is out of range: {}",
                minutes,
                e
            )
        })
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // config.yml is required; LESSONBANK__SECTION__KEY overrides it
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("LESSONBANK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
