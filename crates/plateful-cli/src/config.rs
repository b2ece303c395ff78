//! Configuration file management for plateful.
//!
//! Provides a TOML config file at `~/.config/plateful/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use plateful_core::session::{SESSION_SECRET_ENV, SessionConfig};
use plateful_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded session signing secret (64 hex chars = 32 bytes).
    pub session_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    SessionConfig::DEFAULT_TTL_HOURS
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plateful config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plateful` or
/// `~/.config/plateful`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plateful");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plateful")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Generate a random session secret: 32 random bytes, hex-encoded.
pub fn generate_session_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlatefulConfig {
    pub db_config: DbConfig,
    pub session_config: SessionConfig,
    pub server: ServerSection,
}

impl PlatefulConfig {
    /// Resolve configuration from the CLI flag, environment and config file.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        Self::resolve_from(cli_db_url, load_config().ok())
    }

    /// Resolve against an already-loaded (or absent) config file.
    ///
    /// - DB URL: `cli_db_url` > `PLATEFUL_DATABASE_URL` > `database.url` > default
    /// - Session secret: `PLATEFUL_SESSION_SECRET` > `auth.session_secret` > error
    pub fn resolve_from(cli_db_url: Option<&str>, file_config: Option<ConfigFile>) -> Result<Self> {
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let secret = if let Ok(secret_hex) = std::env::var(SESSION_SECRET_ENV) {
            hex::decode(&secret_hex)
                .with_context(|| format!("{SESSION_SECRET_ENV} env var is not valid hex"))?
        } else if let Some(ref cfg) = file_config {
            hex::decode(&cfg.auth.session_secret)
                .context("invalid hex in config file session_secret")?
        } else {
            bail!(
                "session secret not found; set {SESSION_SECRET_ENV} or run `plateful init` to create a config file"
            );
        };
        if secret.is_empty() {
            bail!("session secret must not be empty");
        }

        let ttl_hours = file_config
            .as_ref()
            .map_or(SessionConfig::DEFAULT_TTL_HOURS, |cfg| cfg.auth.session_ttl_hours);
        if ttl_hours <= 0 {
            bail!("session_ttl_hours must be positive, got {ttl_hours}");
        }
        let ttl = chrono::Duration::try_hours(ttl_hours)
            .with_context(|| format!("session_ttl_hours is out of range: {ttl_hours}"))?;
        let session_config = SessionConfig::new(secret).with_ttl(ttl);
        if session_config.expires_at(chrono::Utc::now()).is_none() {
            bail!("session_ttl_hours is out of range: {ttl_hours}");
        }

        let server = file_config.map(|cfg| cfg.server).unwrap_or_default();

        Ok(Self {
            db_config,
            session_config,
            server,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_HEX: &str = "aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55";

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn file_config(url: &str) -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: url.to_string(),
            },
            auth: AuthSection {
                session_secret: "bb".repeat(32),
                session_ttl_hours: 12,
            },
            server: ServerSection {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }

    fn clear_env() {
        unsafe { std::env::remove_var(DbConfig::ENV_VAR) };
        unsafe { std::env::remove_var(SESSION_SECRET_ENV) };
    }

    #[test]
    fn generate_session_secret_is_64_hex_chars() {
        let secret = generate_session_secret();
        assert_eq!(secret.len(), 64);
        assert!(
            secret.chars().all(|c| c.is_ascii_hexdigit()),
            "expected all hex digits, got: {secret}"
        );
    }

    #[test]
    fn generate_session_secret_is_random() {
        assert_ne!(generate_session_secret(), generate_session_secret());
    }

    #[test]
    fn config_file_roundtrip_fills_server_defaults() {
        let toml_text = r#"
            [database]
            url = "postgresql://testhost:5432/testdb"

            [auth]
            session_secret = "aabb"
        "#;
        let loaded: ConfigFile = toml::from_str(toml_text).unwrap();
        assert_eq!(loaded.database.url, "postgresql://testhost:5432/testdb");
        assert_eq!(loaded.auth.session_ttl_hours, 168);
        assert_eq!(loaded.server, ServerSection::default());
        assert_eq!(loaded.server.port, 3000);

        let written = toml::to_string_pretty(&loaded).unwrap();
        let reread: ConfigFile = toml::from_str(&written).unwrap();
        assert_eq!(reread.auth.session_secret, "aabb");
    }

    #[test]
    fn save_and_load_config_under_xdg_dir() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let saved = save_config(&file_config("postgresql://testhost:5432/testdb"));
        let loaded = load_config();
        let path = config_path();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        saved.unwrap();
        let loaded = loaded.unwrap();
        assert_eq!(path, tmp.path().join("plateful").join("config.toml"));
        assert_eq!(loaded.database.url, "postgresql://testhost:5432/testdb");
        assert_eq!(loaded.auth.session_ttl_hours, 12);
        assert_eq!(loaded.server.port, 8080);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(SESSION_SECRET_ENV, SECRET_HEX) };

        let config = PlatefulConfig::resolve_from(
            Some("postgresql://cli:5432/clidb"),
            Some(file_config("postgresql://file:5432/filedb")),
        )
        .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
        assert_eq!(config.session_config.secret, hex::decode(SECRET_HEX).unwrap());

        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::remove_var(SESSION_SECRET_ENV) };

        let config =
            PlatefulConfig::resolve_from(None, Some(file_config("postgresql://file:5432/filedb")))
                .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.session_config.secret, vec![0xbb; 32]);
        assert_eq!(config.session_config.ttl, chrono::Duration::hours(12));
        assert_eq!(config.server.port, 8080);

        clear_env();
    }

    #[test]
    fn resolve_defaults_when_only_secret_env_set() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(SESSION_SECRET_ENV, SECRET_HEX) };

        let config = PlatefulConfig::resolve_from(None, None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.server, ServerSection::default());
        assert_eq!(
            config.session_config.ttl,
            chrono::Duration::hours(SessionConfig::DEFAULT_TTL_HOURS)
        );

        clear_env();
    }

    #[test]
    fn resolve_errors_when_no_session_secret() {
        let _lock = lock_env();
        clear_env();

        let err = PlatefulConfig::resolve_from(None, None).unwrap_err();
        assert!(
            err.to_string().contains("session secret not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn resolve_rejects_bad_hex_secret() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(SESSION_SECRET_ENV, "not-hex") };

        assert!(PlatefulConfig::resolve_from(None, None).is_err());

        clear_env();
    }

    #[test]
    fn resolve_rejects_non_positive_ttl() {
        let _lock = lock_env();
        clear_env();

        let mut file = file_config("postgresql://file:5432/filedb");
        file.auth.session_ttl_hours = 0;
        let err = PlatefulConfig::resolve_from(None, Some(file)).unwrap_err();
        assert!(err.to_string().contains("session_ttl_hours"), "unexpected error: {err}");
    }

    #[test]
    fn resolve_rejects_ttl_beyond_duration_range() {
        let _lock = lock_env();
        clear_env();

        let mut file = file_config("postgresql://file:5432/filedb");
        file.auth.session_ttl_hours = i64::MAX;
        let err = PlatefulConfig::resolve_from(None, Some(file)).unwrap_err();
        assert!(err.to_string().contains("out of range"), "unexpected error: {err}");
    }

    #[test]
    fn resolve_rejects_ttl_past_the_calendar() {
        let _lock = lock_env();
        clear_env();

        // About a million years: a valid duration, but past chrono's calendar.
        let mut file = file_config("postgresql://file:5432/filedb");
        file.auth.session_ttl_hours = 10_000_000_000;
        let err = PlatefulConfig::resolve_from(None, Some(file)).unwrap_err();
        assert!(err.to_string().contains("out of range"), "unexpected error: {err}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("plateful/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
