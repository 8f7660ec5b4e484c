//! Server configuration.
//!
//! Configuration starts from an optional JSON settings file
//! (`SP_SETTINGS_FILE`) and is then overridden by environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use sp_core::{ClientSettings, ConfigError, PasswordChangeOptions, SettingsFile};

/// Which password change provider to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Active Directory over LDAPS.
    #[default]
    Ldap,
    /// Canned responses keyed on the username, no directory.
    Debug,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ldap" | "ad" => Ok(Self::Ldap),
            "debug" => Ok(Self::Debug),
            other => Err(ConfigError::invalid(
                "SP_PROVIDER",
                format!("expected 'ldap' or 'debug', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ldap => "ldap",
            Self::Debug => "debug",
        })
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// CORS allowed origins. `*` allows any origin.
    pub cors_origins: Vec<String>,

    /// Directory of a pre-built web client to serve, if any.
    pub static_dir: Option<PathBuf>,

    /// Password change provider.
    pub provider: ProviderKind,

    /// Password change policy and directory settings.
    pub options: PasswordChangeOptions,

    /// Settings exposed to the web client.
    pub client: ClientSettings,

    /// Log level.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from the environment (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` to read variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let settings = match var("SP_SETTINGS_FILE") {
            Some(path) => SettingsFile::load(&path)?,
            None => SettingsFile::default(),
        };
        let SettingsFile {
            app_settings: mut options,
            client_settings: mut client,
        } = settings;

        let host = var("SP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("SP_PORT", var("SP_PORT"), 8080)?;

        let cors_origins = var("SP_CORS_ORIGINS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec!["*".to_string()]);

        let static_dir = var("SP_STATIC_DIR").map(PathBuf::from);

        let provider = match var("SP_PROVIDER") {
            Some(kind) => kind.parse()?,
            None => ProviderKind::default(),
        };

        // Directory
        if let Some(hosts) = var("SP_LDAP_HOSTNAMES") {
            options.ldap_hostnames = split_list(&hosts);
        }
        options.ldap_port = parse_or("SP_LDAP_PORT", var("SP_LDAP_PORT"), options.ldap_port)?;
        if let Some(user) = var("SP_LDAP_USERNAME") {
            options.ldap_username = user;
        }
        if let Some(password) = var("SP_LDAP_PASSWORD") {
            options.ldap_password = password;
        }
        if let Some(base) = var("SP_LDAP_SEARCH_BASE") {
            options.ldap_search_base = base;
        }
        options.ldap_validate_certificates = parse_bool_or(
            "SP_LDAP_VALIDATE_CERTIFICATES",
            var("SP_LDAP_VALIDATE_CERTIFICATES"),
            options.ldap_validate_certificates,
        )?;
        if let Some(domain) = var("SP_DEFAULT_DOMAIN") {
            options.default_domain = Some(domain);
        }
        if let Some(id_type) = var("SP_ID_TYPE") {
            options.id_type_for_user = id_type.parse()?;
        }

        // Policy
        if let Some(groups) = var("SP_ALLOWED_GROUPS") {
            options.allowed_ad_groups = split_list(&groups);
        }
        if let Some(groups) = lookup("SP_RESTRICTED_GROUPS") {
            // An explicitly empty value clears the built-in admin groups.
            options.restricted_ad_groups = split_list(&groups);
        }
        options.update_last_password = parse_bool_or(
            "SP_UPDATE_LAST_PASSWORD",
            var("SP_UPDATE_LAST_PASSWORD"),
            options.update_last_password,
        )?;
        options.allow_set_password_fallback = parse_bool_or(
            "SP_ALLOW_SET_PASSWORD_FALLBACK",
            var("SP_ALLOW_SET_PASSWORD_FALLBACK"),
            options.allow_set_password_fallback,
        )?;
        if let Some(url) = var("SP_PWNED_API_URL") {
            options.pwned_passwords_url = url;
        }

        // Client
        if let Some(recaptcha) = client.recaptcha.as_mut() {
            if let Some(key) = var("SP_RECAPTCHA_SITE_KEY") {
                recaptcha.site_key = key;
            }
            if let Some(key) = var("SP_RECAPTCHA_PRIVATE_KEY") {
                recaptcha.private_key = key;
            }
            if let Some(url) = var("SP_RECAPTCHA_VERIFY_URL") {
                recaptcha.verify_url = url;
            }
        }
        client.minimum_distance = parse_or(
            "SP_MINIMUM_DISTANCE",
            var("SP_MINIMUM_DISTANCE"),
            client.minimum_distance,
        )?;
        client.minimum_score =
            parse_or("SP_MINIMUM_SCORE", var("SP_MINIMUM_SCORE"), client.minimum_score)?;
        client.password_entropy = parse_or(
            "SP_PASSWORD_ENTROPY",
            var("SP_PASSWORD_ENTROPY"),
            client.password_entropy,
        )?;

        let log_level = var("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            host,
            port,
            cors_origins,
            static_dir,
            provider,
            options,
            client,
            log_level,
        })
    }

    /// Creates a configuration for testing.
    ///
    /// Uses the debug provider, a random port, and no captcha secret.
    #[must_use]
    pub fn for_testing(pwned_passwords_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            provider: ProviderKind::Debug,
            options: PasswordChangeOptions {
                pwned_passwords_url: pwned_passwords_url.to_string(),
                ..PasswordChangeOptions::default()
            },
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Returns the address to bind to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            static_dir: None,
            provider: ProviderKind::default(),
            options: PasswordChangeOptions::default(),
            client: ClientSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool_or(key: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{raw}' is not a boolean")).into()),
    }
}
