use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEV_DEFAULT_JWT_SECRET: &str = "foodease_development_secret_that_is_long_enough";

/// Constants injected into the pricing calculator.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default)]
pub struct PricingConfig {
    /// Flat fee added to every order
    #[validate(custom = "validate_non_negative")]
    pub service_fee: Decimal,

    /// Surcharge added to rush orders
    #[validate(custom = "validate_non_negative")]
    pub rush_surcharge: Decimal,

    /// Share of the total collected upfront for partial payments
    #[validate(custom = "validate_fraction")]
    pub partial_fraction: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            service_fee: dec!(5),
            rush_surcharge: dec!(20),
            partial_fraction: dec!(0.4),
        }
    }
}

/// Manual UPI collection settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default)]
pub struct PaymentConfig {
    /// UPI id (VPA) customers pay to
    #[validate(custom = "validate_vpa")]
    pub payee_vpa: String,

    #[validate(length(min = 1, max = 64))]
    pub payee_name: String,

    #[validate(length(equal = 3))]
    pub currency: String,

    /// How long a payment reference stays valid
    #[validate(range(min = 30, max = 86400))]
    pub window_secs: u64,

    /// How often lapsed orders are purged; 0 disables the sweep
    pub sweep_interval_secs: u64,

    /// Extra time a lapsed order is kept so the customer can regenerate
    pub abandon_grace_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            payee_vpa: "foodease@upi".to_string(),
            payee_name: "FoodEase".to_string(),
            currency: "INR".to_string(),
            window_secs: 300,
            sweep_interval_secs: 60,
            abandon_grace_secs: 1800,
        }
    }
}

impl PaymentConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs as i64)
    }

    pub fn abandon_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.abandon_grace_secs as i64)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Host address to bind to
    #[validate(length(min = 1))]
    pub host: String,

    /// Port number to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment (development, staging, production)
    #[validate(length(min = 1))]
    pub environment: String,

    /// Secret used to sign and verify HS256 access tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[validate(range(min = 60))]
    pub jwt_expiration: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Comma separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow any origin outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Bounded capacity of the event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the secret and environment.
    pub fn new(jwt_secret: String, environment: String) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment,
            jwt_secret,
            jwt_expiration: 3600,
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            pricing: PricingConfig::default(),
            payment: PaymentConfig::default(),
        }
    }

    /// Returns true if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

fn validate_fraction(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value >= Decimal::ONE {
        return Err(ValidationError::new("fraction_out_of_range"));
    }
    Ok(())
}

fn validate_vpa(value: &str) -> Result<(), ValidationError> {
    match value.split_once('@') {
        Some((handle, provider)) if !handle.is_empty() && !provider.is_empty() => Ok(()),
        _ => Err(ValidationError::new("invalid_vpa")),
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("foodease_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads configuration from `config/`, the `RUN_ENV` profile and `APP__*` variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same layering as [`load_config`] rooted at an explicit directory.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("jwt_expiration", 3600)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a random string of at least 32 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
