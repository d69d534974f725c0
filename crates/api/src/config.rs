use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thumbforge_core::orchestrator::OrchestratorSettings;
use thumbforge_core::references::ReferenceSettings;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Everything except the secrets has a default suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`). Variation batches
    /// run several provider calls back to back, so this is generous.
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Emails granted unlimited access, from comma-separated `ADMIN_EMAILS`.
    pub admin_emails: Vec<String>,
    /// Secret the payment service presents in `x-internal-token`.
    pub internal_api_token: String,
    /// Root under which per-generation scratch directories are created.
    pub scratch_dir: PathBuf,
    pub generation: GenerationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `HOST`                 | `0.0.0.0`                |
    /// | `PORT`                 | `3000`                   |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                    |
    /// | `ADMIN_EMAILS`         | empty                    |
    /// | `INTERNAL_API_TOKEN`   | **required**             |
    /// | `SCRATCH_DIR`          | `$TMPDIR/thumbforge`     |
    ///
    /// JWT and generation settings are loaded by [`JwtConfig::from_env`] and
    /// [`GenerationConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on a missing required variable or an unparsable number.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parsed("PORT", "3000");
        let cors_origins = env_list("CORS_ORIGINS", "http://localhost:5173");
        let request_timeout_secs: u64 = env_parsed("REQUEST_TIMEOUT_SECS", "120");
        let admin_emails = env_list("ADMIN_EMAILS", "");

        let internal_api_token = std::env::var("INTERNAL_API_TOKEN")
            .expect("INTERNAL_API_TOKEN must be set in the environment");
        assert!(
            !internal_api_token.is_empty(),
            "INTERNAL_API_TOKEN must not be empty"
        );

        let scratch_dir = std::env::var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("thumbforge"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            admin_emails,
            internal_api_token,
            scratch_dir,
            generation: GenerationConfig::from_env(),
        }
    }
}

/// Provider credentials and generation tuning.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Reference search is disabled when unset.
    pub youtube_api_key: Option<String>,
    pub max_references: usize,
    pub min_reference_views: u64,
    pub search_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub variation_delay_ms: u64,
    pub max_variations: usize,
}

impl GenerationConfig {
    /// | Env Var                   | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `GEMINI_API_KEY`          | **required**                     |
    /// | `GEMINI_MODEL`            | `gemini-2.5-flash-image-preview` |
    /// | `YOUTUBE_API_KEY`         | unset (references disabled)      |
    /// | `MAX_REFERENCES`          | `3`                              |
    /// | `MIN_REFERENCE_VIEWS`     | `10000`                          |
    /// | `SEARCH_TIMEOUT_SECS`     | `10`                             |
    /// | `FETCH_TIMEOUT_SECS`      | `10`                             |
    /// | `GENERATION_TIMEOUT_SECS` | `90`                             |
    /// | `VARIATION_DELAY_MS`      | `2000`                           |
    /// | `MAX_VARIATIONS`          | `4`                              |
    pub fn from_env() -> Self {
        let gemini_api_key =
            std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set in the environment");
        let gemini_model = std::env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| thumbforge_providers::gemini::DEFAULT_MODEL.into());
        let youtube_api_key = std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            gemini_api_key,
            gemini_model,
            youtube_api_key,
            max_references: env_parsed("MAX_REFERENCES", "3"),
            min_reference_views: env_parsed("MIN_REFERENCE_VIEWS", "10000"),
            search_timeout_secs: env_parsed("SEARCH_TIMEOUT_SECS", "10"),
            fetch_timeout_secs: env_parsed("FETCH_TIMEOUT_SECS", "10"),
            generation_timeout_secs: env_parsed("GENERATION_TIMEOUT_SECS", "90"),
            variation_delay_ms: env_parsed("VARIATION_DELAY_MS", "2000"),
            max_variations: env_parsed("MAX_VARIATIONS", "4"),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_references: self.max_references,
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            variation_delay: Duration::from_millis(self.variation_delay_ms),
            max_variations: self.max_variations,
        }
    }

    pub fn reference_settings(&self) -> ReferenceSettings {
        ReferenceSettings {
            min_popularity: self.min_reference_views,
            search_timeout: Duration::from_secs(self.search_timeout_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

fn env_parsed<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.into());
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key} must be a valid number, got {raw:?}: {e}"))
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.into())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
