//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. `ADMIN_EMAIL` (unless the prefixed variable is set)
//! 2. Environment variables (GATEKEEPER__SECTION__KEY)
//! 3. Configuration file (TOML)
//! 4. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "gatekeeper.toml",
    ".gatekeeper.toml",
    "~/.config/gatekeeper/config.toml",
    "/etc/gatekeeper/config.toml",
];

const ENV_PREFIX: &str = "GATEKEEPER";

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder().add_source(File::from_str(toml_str, FileFormat::Toml));
    let app_config = build(builder)?;
    validate_config(&app_config)?;
    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // First existing default path wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g. GATEKEEPER__SERVER__PORT=9000, GATEKEEPER__RULES__PATH=/etc/roles.csv
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("realm.kinds")
            .try_parsing(true),
    );

    // Plain ADMIN_EMAIL, as commonly set in container deployments
    if std::env::var(format!("{}__IDENTITY__ADMIN_EMAIL", ENV_PREFIX)).is_err()
        && let Ok(email) = std::env::var("ADMIN_EMAIL")
    {
        builder = builder
            .set_override("identity.admin_email", email)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    let app_config = build(builder)?;
    validate_config(&app_config)?;
    Ok(app_config)
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    validate_url(&config.identity.provider_url, "identity.provider_url")?;
    if let Some(url) = &config.identity.user_store_url {
        validate_url(url, "identity.user_store_url")?;
    }

    for (value, field) in [
        (config.identity.timeout_secs, "identity.timeout_secs"),
        (config.delegation.timeout_secs, "delegation.timeout_secs"),
        (config.session.cache_ttl_secs, "session.cache_ttl_secs"),
        (config.session.idle_timeout_secs, "session.idle_timeout_secs"),
        (config.session.sweep_interval_secs, "session.sweep_interval_secs"),
    ] {
        if value == 0 {
            return Err(ConfigError::Invalid {
                message: format!("{} must be greater than 0", field),
            });
        }
    }

    for (name, field) in [
        (&config.session.credential_cookie, "session.credential_cookie"),
        (&config.session.cache_cookie, "session.cache_cookie"),
    ] {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return Err(ConfigError::Invalid {
                message: format!("{} must be a non-empty cookie name, got: '{}'", field, name),
            });
        }
    }
    if config.session.credential_cookie == config.session.cache_cookie {
        return Err(ConfigError::Invalid {
            message: "session.credential_cookie and session.cache_cookie must differ".to_string(),
        });
    }

    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Missing {
            field: field.to_string(),
        });
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            message: format!("{} must start with http:// or https://, got: {}", field, url),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[server]
port = 9000

[rules]
path = "/etc/gatekeeper/roles.csv"

[identity]
provider_url = "https://idp.example.com/verify"
admin_email = "admin@example.com"
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.rules.path.to_str(), Some("/etc/gatekeeper/roles.csv"));
        assert_eq!(config.identity.admin_email.as_deref(), Some("admin@example.com"));
        assert_eq!(config.session.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_static_users() {
        let toml = r#"
[[identity.users]]
email = "alice@example.com"
roles = "public,protected,photos"

[[identity.users]]
email = "bob@example.com"
enabled = false
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.identity.users.len(), 2);
        assert_eq!(config.identity.users[0].roles, "public,protected,photos");
        assert!(!config.identity.users[1].enabled);
    }

    #[test]
    fn test_invalid_provider_url() {
        let toml = r#"
[identity]
provider_url = "idp.local/verify"
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_provider_url() {
        let toml = r#"
[identity]
provider_url = ""
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        for toml in [
            "[server]\nport = 0\n",
            "[delegation]\ntimeout_secs = 0\n",
            "[session]\ncache_ttl_secs = 0\n",
        ] {
            assert!(load_config_from_str(toml).is_err(), "accepted: {}", toml);
        }
    }

    #[test]
    fn test_cookie_names_validated() {
        assert!(load_config_from_str("[session]\ncache_cookie = \"session\"\n").is_err());
        assert!(load_config_from_str("[session]\ncredential_cookie = \"a b\"\n").is_err());
    }
}
