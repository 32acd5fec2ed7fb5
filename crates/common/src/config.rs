use serde::Deserialize;
use std::time::Duration;
use validator::Validate;
use weir_error::{ErrorCode, ErrorContext, WeirError};

// Default constants
pub const DEFAULT_SWAP_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_USE_TIMEOUT: bool = false;
pub const DEFAULT_USE_CALLBACK: bool = true;

pub const DEFAULT_SERVICE_NAME: &str = "weir-runtime";
pub const DEFAULT_TELEMETRY_ENABLED: bool = false;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

pub const ENV_PREFIX: &str = "WEIR";

#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub adaptive_join: AdaptiveJoinSettings,
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// Settings of the adaptive join actor.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AdaptiveJoinSettings {
    /// Disable the adaptive join actor regardless of the execution context.
    #[serde(default)]
    pub skip_adaptive_join: bool,

    /// Delay after which the first phase is swapped out, when `use_timeout` is set.
    #[serde(default = "default_swap_timeout_ms")]
    #[validate(range(min = 1))]
    pub swap_timeout_ms: u64,

    #[serde(default = "default_use_timeout")]
    pub use_timeout: bool,

    /// Install a swap trigger into the execution context of the first phase.
    #[serde(default = "default_use_callback")]
    pub use_callback: bool,
}

impl AdaptiveJoinSettings {
    /// The swap timeout, if timer-driven swapping is enabled.
    pub fn swap_timeout(&self) -> Option<Duration> {
        self.use_timeout
            .then(|| Duration::from_millis(self.swap_timeout_ms))
    }
}

impl Default for AdaptiveJoinSettings {
    fn default() -> Self {
        Self {
            skip_adaptive_join: false,
            swap_timeout_ms: default_swap_timeout_ms(),
            use_timeout: default_use_timeout(),
            use_callback: default_use_callback(),
        }
    }
}

fn default_swap_timeout_ms() -> u64 {
    DEFAULT_SWAP_TIMEOUT_MS
}

fn default_use_timeout() -> bool {
    DEFAULT_USE_TIMEOUT
}

fn default_use_callback() -> bool {
    DEFAULT_USE_CALLBACK
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// OTLP collector, `http` or `https`.
    #[serde(default = "default_otlp_endpoint")]
    #[validate(custom(function = "validate_endpoint"))]
    pub endpoint: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            endpoint: default_otlp_endpoint(),
            service_name: default_service_name(),
        }
    }
}

fn default_telemetry_enabled() -> bool {
    DEFAULT_TELEMETRY_ENABLED
}

fn default_otlp_endpoint() -> String {
    DEFAULT_OTLP_ENDPOINT.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn validate_endpoint(endpoint: &str) -> Result<(), validator::ValidationError> {
    match url::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(_) => Err(validator::ValidationError::new("unsupported_scheme")),
        Err(_) => Err(validator::ValidationError::new("invalid_url")),
    }
}

impl AppConfig {
    /// Load configuration from an optional file, overridden by environment.
    ///
    /// `WEIR__ADAPTIVE_JOIN__USE_TIMEOUT=true` maps to `adaptive_join.use_timeout`.
    pub fn from_file(path: &str) -> weir_error::Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                let err: WeirError = e.into();
                err.with_context(ErrorContext::Config {
                    file_path: Some(path.to_string()),
                    field: None,
                })
            })?;

        app_config.validate().map_err(|e| {
            WeirError::new(
                ErrorCode::SchemaViolation,
                format!("Configuration validation failed: {}", e),
            )
            .with_context(ErrorContext::Config {
                file_path: Some(path.to_string()),
                field: e.errors().keys().next().map(|k| k.to_string()),
            })
        })?;

        Ok(app_config)
    }
}
