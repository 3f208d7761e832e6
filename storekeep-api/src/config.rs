/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:5000)
/// - `CORS_ORIGINS`: Comma separated origins, `*` for any (default: *)
/// - `IO_TIMEOUT_SECONDS`: Bound on store and mail calls (default: 10)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Token signing secret, at least 32 characters (required)
/// - `SESSION_TTL_MINUTES` / `ACTION_TOKEN_TTL_MINUTES`: Token lifetimes (default: 60 / 15)
/// - `SITE_URL`: Base of emailed links (default: http://localhost:3000)
/// - `COMPANY_NAME`: Signature in emails (default: Storekeep)
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `MAIL_FROM`:
///   SMTP relay; without `SMTP_HOST` mail is logged instead of sent
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use storekeep_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::time::Duration;

use storekeep_shared::accounts::AccountSettings;
use storekeep_shared::auth::token::TokenPolicy;
use storekeep_shared::mail::SmtpSettings;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub accounts: AccountsConfig,

    /// `None` when `SMTP_HOST` is unset
    pub smtp: Option<SmtpConfig>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins, `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for token signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub session_ttl_minutes: i64,
    pub action_ttl_minutes: i64,
}

/// Account workflow configuration
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    pub site_url: String,
    pub company_name: String,
    pub io_timeout_seconds: u64,
}

/// SMTP relay configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// A `.env` file in the working directory is honoured.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let api_port = var("API_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database_url = required("DATABASE_URL")?;
        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let session_ttl_minutes = ttl_minutes(&var("SESSION_TTL_MINUTES", "60"), "SESSION_TTL_MINUTES")?;
        let action_ttl_minutes = ttl_minutes(&var("ACTION_TOKEN_TTL_MINUTES", "15"), "ACTION_TOKEN_TTL_MINUTES")?;
        let io_timeout_seconds = positive(&var("IO_TIMEOUT_SECONDS", "10"), "IO_TIMEOUT_SECONDS")? as u64;

        let smtp = match lookup("SMTP_HOST").filter(|h| !h.trim().is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: var("SMTP_PORT", "587")
                    .parse::<u16>()
                    .map_err(|e| anyhow::anyhow!("SMTP_PORT is invalid: {}", e))?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
                from_address: required("MAIL_FROM")?,
            }),
            None => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                session_ttl_minutes,
                action_ttl_minutes,
            },
            accounts: AccountsConfig {
                site_url: var("SITE_URL", "http://localhost:3000"),
                company_name: var("COMPANY_NAME", "Storekeep"),
                io_timeout_seconds,
            },
            smtp,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            session_ttl: chrono::Duration::minutes(self.jwt.session_ttl_minutes),
            action_ttl: chrono::Duration::minutes(self.jwt.action_ttl_minutes),
        }
    }

    pub fn account_settings(&self) -> AccountSettings {
        AccountSettings {
            site_url: self.accounts.site_url.clone(),
            company_name: self.accounts.company_name.clone(),
            io_timeout: Duration::from_secs(self.accounts.io_timeout_seconds),
        }
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        self.smtp.as_ref().map(|smtp| SmtpSettings {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from_address: smtp.from_address.clone(),
        })
    }
}

/// Longest token lifetime accepted from configuration
const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

fn ttl_minutes(raw: &str, key: &str) -> anyhow::Result<i64> {
    let minutes = positive(raw, key)?;
    if minutes > MAX_TTL_MINUTES {
        anyhow::bail!("{} must not exceed {} minutes", key, MAX_TTL_MINUTES);
    }
    Ok(minutes)
}

fn positive(raw: &str, key: &str) -> anyhow::Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => anyhow::bail!("{} must be a positive integer", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.token_policy(), TokenPolicy::default());
        assert_eq!(config.account_settings().io_timeout, Duration::from_secs(10));
        assert_eq!(config.accounts.site_url, "http://localhost:3000");
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_required_variables() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/test")]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_invalid_numbers() {
        let base = [("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", SECRET)];

        assert!(load(&[base[0], base[1], ("API_PORT", "http")]).is_err());
        assert!(load(&[base[0], base[1], ("SESSION_TTL_MINUTES", "0")]).is_err());
        assert!(load(&[base[0], base[1], ("IO_TIMEOUT_SECONDS", "-5")]).is_err());
    }

    #[test]
    fn test_token_lifetimes_are_bounded() {
        let base = [("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", SECRET)];

        assert!(load(&[base[0], base[1], ("SESSION_TTL_MINUTES", "9223372036854775807")]).is_err());
        assert!(load(&[base[0], base[1], ("ACTION_TOKEN_TTL_MINUTES", "200000000000")]).is_err());

        let config = load(&[base[0], base[1], ("SESSION_TTL_MINUTES", "525600")]).unwrap();
        assert_eq!(config.token_policy().session_ttl, chrono::Duration::days(365));
    }

    #[test]
    fn test_smtp_section() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("SMTP_HOST", "smtp.example.com"),
            ("MAIL_FROM", "Storekeep <noreply@example.com>"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();

        let smtp = config.smtp_settings().unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_none());
        assert_eq!(config.api.cors_origins, vec!["https://a.example", "https://b.example"]);

        let missing_from = load(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("SMTP_HOST", "smtp.example.com"),
        ]);
        assert!(missing_from.is_err());
    }
}
