//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and kept in memory.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How exercises are addressed in inline button payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// `remove_exercise_2`: the 0-based position at render time.
    Position,
    /// `remove_exercise_Barbell_Squat`: the stable catalog ID.
    ExerciseId,
}

impl FromStr for IdScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" => Ok(IdScheme::Position),
            "exercise_id" | "id" => Ok(IdScheme::ExerciseId),
            _ => Err(ConfigError::Invalid("ACTION_ID_SCHEME", s.to_string())),
        }
    }
}

/// Where the linked sheet comes from after authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetProvisioning {
    /// Create and format a new spreadsheet on the user's behalf.
    Create,
    /// Ask the user to paste the ID of an existing spreadsheet.
    Manual,
}

impl FromStr for SheetProvisioning {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(SheetProvisioning::Create),
            "manual" => Ok(SheetProvisioning::Manual),
            _ => Err(ConfigError::Invalid("SHEET_PROVISIONING", s.to_string())),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            _ => Err(ConfigError::Invalid("STORE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Redirect URL registered with Google; must route to this server
    pub oauth_redirect_url: String,
    /// Server port for the OAuth redirect listener
    pub port: u16,
    /// Path to the exercise catalog JSON
    pub exercises_path: String,
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore and KMS)
    pub gcp_project_id: String,
    pub gcp_region: String,
    /// KMS key used to encrypt tokens at rest. Tokens are only base64-encoded
    /// when unset.
    pub kms_key_name: Option<String>,
    pub id_scheme: IdScheme,
    pub sheet_provisioning: SheetProvisioning,
    /// Number of exercises handed out per "get exercises"
    pub exercises_per_day: usize,
    /// Lifetime of an unredeemed authorization state
    pub auth_state_ttl: Duration,
    pub auth_state_purge_interval: Duration,
    /// Upper bound for any single call to Google
    pub provider_timeout: Duration,
    /// Refresh this long before the recorded expiry
    pub token_refresh_margin: Duration,

    // --- Secrets ---
    /// Telegram bot token
    pub telegram_token: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            oauth_redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
            port: 8080,
            exercises_path: "exercises.json".to_string(),
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            kms_key_name: None,
            id_scheme: IdScheme::ExerciseId,
            sheet_provisioning: SheetProvisioning::Create,
            exercises_per_day: 5,
            auth_state_ttl: Duration::from_secs(15 * 60),
            auth_state_purge_interval: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(10),
            token_refresh_margin: Duration::ZERO,
            telegram_token: "test_telegram_token".to_string(),
            google_client_secret: "test_secret".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            oauth_redirect_url: env::var("OAUTH_REDIRECT_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/auth/google/callback", port)),
            port,
            exercises_path: env::var("EXERCISES_PATH")
                .unwrap_or_else(|_| "exercises.json".to_string()),
            store_backend: parsed("STORE_BACKEND", StoreBackend::Memory)?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            kms_key_name: env::var("KMS_KEY_NAME").ok().filter(|v| !v.trim().is_empty()),
            id_scheme: parsed("ACTION_ID_SCHEME", IdScheme::ExerciseId)?,
            sheet_provisioning: parsed("SHEET_PROVISIONING", SheetProvisioning::Create)?,
            exercises_per_day: number("EXERCISES_PER_DAY", 5)? as usize,
            auth_state_ttl: Duration::from_secs(number("AUTH_STATE_TTL_SECS", 15 * 60)?),
            auth_state_purge_interval: Duration::from_secs(number(
                "AUTH_STATE_PURGE_INTERVAL_SECS",
                60,
            )?),
            provider_timeout: Duration::from_secs(number("PROVIDER_TIMEOUT_SECS", 10)?),
            token_refresh_margin: Duration::from_secs(number("TOKEN_REFRESH_MARGIN_SECS", 0)?),

            telegram_token: required("TELEGRAM_TOKEN")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr<Err = ConfigError>>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse(),
        Err(_) => Ok(default),
    }
}

fn number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, value)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("TELEGRAM_TOKEN", "123:abc");
        env::set_var("GOOGLE_CLIENT_ID", "test_id");
        env::set_var("GOOGLE_CLIENT_SECRET", " test_secret ");
        env::set_var("ACTION_ID_SCHEME", "position");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google_client_id, "test_id");
        assert_eq!(config.google_client_secret, "test_secret");
        assert_eq!(config.id_scheme, IdScheme::Position);
        assert_eq!(config.auth_state_ttl, Duration::from_secs(900));

        env::remove_var("ACTION_ID_SCHEME");
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Exercise_ID".parse::<IdScheme>().unwrap(), IdScheme::ExerciseId);
        assert_eq!(
            "manual".parse::<SheetProvisioning>().unwrap(),
            SheetProvisioning::Manual
        );
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
