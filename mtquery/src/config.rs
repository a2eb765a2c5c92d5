//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `MTQUERY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `MTQUERY_` override YAML values
//! 3. **Capability map** - If `capability_map` points to a YAML file, its `capabilities` list
//!    replaces the inline `capabilities`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `MTQUERY_ROUTER__PASSWORD=secret` sets `router.password`.
//!
//! ## Credentials
//!
//! `router.password` is only used for the RouterOS API. Backups log in over ssh in batch mode
//! with the key in `router.ssh_identity`, which must be set while `backup.enabled` is true.
//! The key has to be imported for `router.username` on the router (`/user ssh-keys import`).
//!
//! ## Example
//!
//! ```yaml
//! port: 8080
//! router:
//!   host: 192.168.100.1
//!   username: api
//!   ssh_identity: /etc/mtquery/id_ed25519
//! backup:
//!   path: /var/lib/mtquery/backups
//!   interval: 2m
//! capabilities:
//!   - name: TCE
//!     base_ip: 192.168.100
//!     start: 50
//!     end: 70
//!     base_mac: "93:FB"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::PathBuf, time::Duration};

use crate::capability::CapabilityRule;
use crate::errors::Error;
use crate::query::models::FirmwareVersion;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MTQUERY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Requests taking longer than this are answered with 408
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// The managed router: default query target and backup source
    pub router: RouterConfig,
    pub backup: BackupConfig,
    /// Routers running older firmware are reported unhealthy
    pub firmware_baseline: FirmwareVersion,
    /// Capability classification rules
    pub capabilities: Vec<CapabilityRule>,
    /// Optional YAML file holding a `capabilities` list. Overrides `capabilities` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_map: Option<PathBuf>,
}

/// Connection settings for the managed router.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub host: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// RouterOS API port
    pub api_port: u16,
    pub ssh_port: u16,
    /// Private key passed to `ssh -i`. Required when backups are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_identity: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Upper bound for a single API command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_port", &self.api_port)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_identity", &self.ssh_identity)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: "192.168.88.1".to_string(),
            username: "admin".to_string(),
            password: None,
            api_port: 8728,
            ssh_port: 22,
            ssh_identity: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration backup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Run the recurring backup job
    pub enabled: bool,
    /// Directory backups are written to
    pub path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// How long a backup waits for a running one to finish
    #[serde(with = "humantime_serde")]
    pub guard_timeout: Duration,
    pub export_command: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("config_backup"),
            interval: Duration::from_secs(120),
            guard_timeout: Duration::from_secs(60),
            export_command: "/export compact".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(120),
            enable_otel_export: false,
            router: RouterConfig::default(),
            backup: BackupConfig::default(),
            firmware_baseline: FirmwareVersion::default(),
            capabilities: Vec::new(),
            capability_map: None,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(path) = &config.capability_map {
            if !path.is_file() {
                return Err(figment::Error::from(format!(
                    "capability map {} does not exist",
                    path.display()
                )));
            }
            config.capabilities = Figment::from(Yaml::file(path)).extract_inner("capabilities")?;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Error::Internal {
            operation: format!("Config validation: {message}"),
        };

        if self.router.host.trim().is_empty() {
            return Err(invalid("router.host must not be empty".to_string()));
        }

        let interval = self.backup.interval;
        if interval < Duration::from_secs(60) || interval.as_secs() % 60 != 0 || interval.subsec_nanos() != 0 {
            return Err(invalid(format!(
                "backup.interval must be a whole number of minutes, got {:?}",
                interval
            )));
        }

        if self.backup.guard_timeout.is_zero() {
            return Err(invalid("backup.guard_timeout must be greater than zero".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout must be greater than zero".to_string()));
        }

        let mut seen = HashSet::new();
        for rule in &self.capabilities {
            if !seen.insert(rule.name) {
                return Err(invalid(format!("capability {} is defined more than once", rule.name)));
            }
            if rule.start_octet > rule.end_octet {
                return Err(invalid(format!(
                    "capability {}: start ({}) cannot be greater than end ({})",
                    rule.name, rule.start_octet, rule.end_octet
                )));
            }
        }

        if self.backup.enabled && self.router.ssh_identity.is_none() {
            return Err(invalid(
                "router.ssh_identity is required while backup.enabled is true".to_string(),
            ));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("MTQUERY_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityName;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "router:\n  ssh_identity: id_ed25519\n")?;

            let config = Config::load(&args())?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.router.api_port, 8728);
            assert_eq!(config.router.ssh_port, 22);
            assert_eq!(config.backup.path, PathBuf::from("config_backup"));
            assert_eq!(config.backup.interval, Duration::from_secs(120));
            assert_eq!(config.backup.guard_timeout, Duration::from_secs(60));
            assert_eq!(config.backup.export_command, "/export compact");
            assert_eq!(config.firmware_baseline, "6.44.5".parse().unwrap());
            assert!(config.capabilities.is_empty());

            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
router:
  host: 192.168.100.1
  username: api
  connect_timeout: 5s
  ssh_identity: id_ed25519
backup:
  interval: 10m
firmware_baseline: "6.48.1"
capabilities:
  - name: TCE
    base_ip: "192.168.100"
    start: 50
    end: 70
    base_mac: "93:FB"
"#,
            )?;

            jail.set_env("MTQUERY_PORT", "9000");
            jail.set_env("MTQUERY_ROUTER__PASSWORD", "hunter2");
            jail.set_env("MTQUERY_CONFIG", "test.yaml");

            let config = Config::load(&args())?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.router.host, "192.168.100.1");
            assert_eq!(config.router.username, "api");
            assert_eq!(config.router.password.as_deref(), Some("hunter2"));
            assert_eq!(config.router.connect_timeout, Duration::from_secs(5));
            assert_eq!(config.backup.interval, Duration::from_secs(600));
            assert_eq!(config.firmware_baseline, "6.48.1".parse().unwrap());

            let tce = &config.capabilities[0];
            assert_eq!(tce.name, CapabilityName::Tce);
            assert_eq!(tce.start_octet, 50);
            assert_eq!(tce.end_octet, 70);

            Ok(())
        });
    }

    #[test]
    fn test_capability_map_overrides_inline_rules() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "capabilities.yaml",
                r#"
capabilities:
  - name: IRR
    base_ip: "10.1.0"
    start: 10
    end: 20
    base_mac: "00:0C"
  - name: VID
    base_ip: "10.2.0"
    start: 100
    end: 120
    base_mac: "00:1A"
"#,
            )?;
            jail.create_file(
                "test.yaml",
                r#"
capability_map: capabilities.yaml
router:
  ssh_identity: id_ed25519
capabilities:
  - name: TCE
    base_ip: "192.168.100"
    start: 50
    end: 70
    base_mac: "93:FB"
"#,
            )?;

            let config = Config::load(&args())?;

            let names: Vec<_> = config.capabilities.iter().map(|r| r.name).collect();
            assert_eq!(names, vec![CapabilityName::Irr, CapabilityName::Vid]);

            Ok(())
        });
    }

    #[test]
    fn test_missing_capability_map_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "capability_map: nowhere.yaml\n")?;

            let result = Config::load(&args());
            assert!(result.is_err());

            Ok(())
        });
    }

    #[test]
    fn test_duplicate_capability_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
capabilities:
  - { name: TCE, base_ip: "192.168.100", start: 50, end: 70, base_mac: "93:FB" }
  - { name: TCE, base_ip: "192.168.101", start: 50, end: 70, base_mac: "93:FB" }
"#,
            )?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("more than once"));

            Ok(())
        });
    }

    #[test]
    fn test_inverted_octet_range_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
capabilities:
  - { name: PWR, base_ip: "192.168.100", start: 90, end: 80, base_mac: "00:0C" }
"#,
            )?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("cannot be greater than end"));

            Ok(())
        });
    }

    #[test]
    fn test_backups_require_ssh_identity() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "router:\n  password: secret\n")?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("router.ssh_identity is required"));

            jail.create_file("test.yaml", "router:\n  password: secret\nbackup:\n  enabled: false\n")?;
            assert!(Config::load(&args()).is_ok());

            Ok(())
        });
    }

    #[test]
    fn test_backup_interval_must_be_whole_minutes() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "router:\n  ssh_identity: id_ed25519\nbackup:\n  interval: 30s\n")?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("whole number of minutes"));

            jail.create_file("test.yaml", "router:\n  ssh_identity: id_ed25519\nbackup:\n  interval: 90s\n")?;
            assert!(Config::load(&args()).is_err());

            jail.create_file("test.yaml", "router:\n  ssh_identity: id_ed25519\nbackup:\n  interval: 5m\n")?;
            assert_eq!(Config::load(&args())?.backup.interval, Duration::from_secs(300));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "router:\n  hostname: 10.0.0.1\n")?;

            assert!(Config::load(&args()).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_password_is_redacted() {
        let config = RouterConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
