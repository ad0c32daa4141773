//! On-disk configuration.
//!
//! Values come from a TOML file, then environment overrides, then CLI flags
//! (applied in `cli::build_config`).

use crate::mail::parse_recipients;
use crate::model::{MailSettings, RunConfig};
use crate::text_summary::REPORT_TITLE;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_USERNAME: &str = "COLO_PHONES_UCM_USERNAME";
pub const ENV_PASSWORD: &str = "COLO_PHONES_UCM_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Registration address of the colo gateway.
    pub target_ip: String,
    pub restart_enabled: bool,
    pub ucm: UcmSection,
    pub mail: MailSection,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            target_ip: String::new(),
            restart_enabled: true,
            ucm: UcmSection::default(),
            mail: MailSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UcmSection {
    pub server: String,
    pub username: String,
    pub password: String,
    pub axl_version: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for UcmSection {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: String::new(),
            axl_version: "12.5".to_string(),
            timeout: Duration::from_secs(20),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    pub enabled: bool,
    pub from: String,
    pub to: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub starttls: bool,
    pub subject: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            enabled: true,
            from: String::new(),
            to: String::new(),
            smtp_server: String::new(),
            smtp_port: 25,
            starttls: false,
            subject: REPORT_TITLE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FileConfig {
    /// `$XDG_CONFIG_HOME/colo-phones/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("colo-phones").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the default file when it exists, otherwise start from defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(p) if p.exists() => Self::load(&p),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply credential overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup(ENV_USERNAME).filter(|v| !v.is_empty()) {
            self.ucm.username = user;
        }
        if let Some(pass) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.ucm.password = pass;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ucm.server.trim().is_empty() {
            return Err(ConfigError::Invalid("ucm.server is required".into()));
        }
        if self.ucm.username.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "ucm.username is required (or set {})",
                ENV_USERNAME
            )));
        }
        if self.target_ip.trim().is_empty() {
            return Err(ConfigError::Invalid("target_ip is required".into()));
        }
        if self.target_ip.trim().parse::<Ipv4Addr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "target_ip {:?} is not an IPv4 address",
                self.target_ip
            )));
        }
        if self.ucm.timeout.is_zero() {
            return Err(ConfigError::Invalid("ucm.timeout must be non-zero".into()));
        }
        if self.mail.enabled {
            for (field, value) in [
                ("mail.from", &self.mail.from),
                ("mail.to", &self.mail.to),
                ("mail.smtp_server", &self.mail.smtp_server),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{} is required when mail is enabled",
                        field
                    )));
                }
            }
            if let Err(e) = self.mail.from.trim().parse::<Mailbox>() {
                return Err(ConfigError::Invalid(format!(
                    "mail.from {:?}: {}",
                    self.mail.from, e
                )));
            }
            if let Err(e) = parse_recipients(&self.mail.to) {
                return Err(ConfigError::Invalid(format!(
                    "mail.to {:?}: {}",
                    self.mail.to, e
                )));
            }
        }
        Ok(())
    }

    pub fn into_run_config(self) -> RunConfig {
        let mail = self.mail.enabled.then(|| MailSettings {
            from: self.mail.from,
            to: self.mail.to,
            smtp_server: self.mail.smtp_server,
            smtp_port: self.mail.smtp_port,
            starttls: self.mail.starttls,
            subject: self.mail.subject,
            timeout: self.mail.timeout,
        });
        RunConfig {
            server: self.ucm.server.trim().to_string(),
            username: self.ucm.username,
            password: self.ucm.password,
            axl_version: self.ucm.axl_version,
            timeout: self.ucm.timeout,
            accept_invalid_certs: self.ucm.accept_invalid_certs,
            target_ip: self.target_ip.trim().to_string(),
            restart_enabled: self.restart_enabled,
            mail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
target_ip = "203.0.113.10"
restart_enabled = false

[ucm]
server = "ucm-pub.acmewidgets.com"
username = "axladmin"
password = "from-file"
timeout = "45s"

[mail]
from = "telcom-dudes@acmewidgets.com"
to = "user1@acmewidgets.com, user2@acmewidgets.com"
smtp_server = "acmewidgets-com.mail.protection.outlook.com"
"#;

    #[test]
    fn sample_parses_with_defaults() {
        let cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.target_ip, "203.0.113.10");
        assert!(!cfg.restart_enabled);
        assert_eq!(cfg.ucm.timeout, Duration::from_secs(45));
        assert_eq!(cfg.ucm.axl_version, "12.5");
        assert!(cfg.ucm.accept_invalid_certs);
        assert_eq!(cfg.mail.smtp_port, 25);
        assert_eq!(cfg.mail.subject, REPORT_TITLE);
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_credentials() {
        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.apply_env_from(|key| match key {
            ENV_PASSWORD => Some("from-env".to_string()),
            ENV_USERNAME => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.ucm.password, "from-env");
        assert_eq!(cfg.ucm.username, "axladmin");
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.ucm.server = " ".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.target_ip = "colo-expressway".into();
        assert!(cfg.validate().is_err());

        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.mail.to.clear();
        assert!(cfg.validate().is_err());
        cfg.mail.enabled = false;
        cfg.validate().unwrap();
    }

    #[test]
    fn malformed_mail_addresses_fail_validation() {
        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.mail.from = "not an address".into();
        match cfg.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.starts_with("mail.from")),
            other => panic!("expected invalid mail.from, got {other:?}"),
        }

        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.mail.to = "user1@acmewidgets.com, also-bad".into();
        match cfg.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.starts_with("mail.to")),
            other => panic!("expected invalid mail.to, got {other:?}"),
        }

        cfg.mail.enabled = false;
        cfg.validate().unwrap();
    }

    #[test]
    fn disabled_mail_yields_no_settings() {
        let mut cfg = FileConfig::from_toml_str(SAMPLE).unwrap();
        cfg.mail.enabled = false;
        let run = cfg.into_run_config();
        assert!(run.mail.is_none());
        assert_eq!(run.ris_url(), "https://ucm-pub.acmewidgets.com:8443/realtimeservice2/services/RISService70");
        assert_eq!(run.axl_url(), "https://ucm-pub.acmewidgets.com:8443/axl/");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            FileConfig::from_toml_str("target_ip = [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let cfg = FileConfig::load(&path).unwrap();
        assert_eq!(cfg.ucm.server, "ucm-pub.acmewidgets.com");

        let missing = FileConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
