use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{MailError, Result};

pub const DEFAULT_ACCOUNT: &str = "primary";
pub const CONFIG_ENV: &str = "EMAIL_CONFIG";
const SYSTEM_CONFIG: &str = "/etc/mailroom/config.json";
const LOCAL_CONFIG: &str = "config.json";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_IMAP_PORT: u16 = 993;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl Account {
    /// Mailbox used for the `From` header and the SMTP envelope.
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("from", &self.from)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_imap_port() -> u16 {
    DEFAULT_IMAP_PORT
}

fn default_use_ssl() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_cc: Vec<String>,
    pub default_bcc: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

/// On-disk shape of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub accounts: BTreeMap<String, Account>,
    pub default_account: Option<String>,
    pub presets: BTreeMap<String, Preset>,
    pub recipients: BTreeMap<String, Vec<String>>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
    Inline,
}

/// Resolved configuration, loaded once per process.
#[derive(Debug, Clone)]
pub struct Config {
    source: ConfigSource,
    file: ConfigFile,
    env_missing: Vec<&'static str>,
}

impl Config {
    /// Resolves the config file (explicit path, `EMAIL_CONFIG`, then the
    /// system/local/user locations) and falls back to environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// `load` with every environment read going through `lookup`.
    pub fn load_with<F>(explicit: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| lookup(CONFIG_ENV).map(PathBuf::from));
        if let Some(path) = requested {
            if path.exists() {
                return Self::from_path(&path);
            }
            warn!(path = %path.display(), "requested config file not found, searching defaults");
        }
        for path in candidates_with(&lookup) {
            if path.exists() {
                return Self::from_path(&path);
            }
        }
        debug!("no config file found, reading accounts from environment");
        Self::from_env_with(lookup)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config file");
        let text = std::fs::read_to_string(path).map_err(|e| {
            MailError::config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let file = parse_config_file(&text)
            .map_err(|e| MailError::config(format!("Invalid config {}: {}", path.display(), e)))?;
        Ok(Self {
            source: ConfigSource::File(path.to_path_buf()),
            file,
            env_missing: Vec::new(),
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let file = parse_config_file(text)
            .map_err(|e| MailError::config(format!("Invalid config: {}", e)))?;
        Ok(Self {
            source: ConfigSource::Inline,
            file,
            env_missing: Vec::new(),
        })
    }

    /// Builds a single `primary` account from `SMTP_*`/`IMAP_*` variables.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let smtp_port = parse_port(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?;
        let imap_port = parse_port(get("IMAP_PORT"), "IMAP_PORT", DEFAULT_IMAP_PORT)?;
        let use_ssl = get("USE_SSL")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let smtp_host = get("SMTP_HOST");
        let imap_host = get("IMAP_HOST");
        let username = get("SMTP_USERNAME").or_else(|| get("IMAP_USERNAME"));
        let password = get("SMTP_PASSWORD").or_else(|| get("IMAP_PASSWORD"));

        let mut env_missing = Vec::new();
        if smtp_host.is_none() {
            env_missing.push("SMTP_HOST");
        }
        if imap_host.is_none() {
            env_missing.push("IMAP_HOST");
        }
        if username.is_none() {
            env_missing.push("SMTP_USERNAME");
        }
        if password.is_none() {
            env_missing.push("SMTP_PASSWORD");
        }

        let mut file = ConfigFile {
            default_account: Some(DEFAULT_ACCOUNT.to_string()),
            ..ConfigFile::default()
        };
        if let (Some(smtp_host), Some(imap_host), Some(username), Some(password)) =
            (smtp_host, imap_host, username, password)
        {
            file.accounts.insert(
                DEFAULT_ACCOUNT.to_string(),
                Account {
                    smtp_host,
                    smtp_port,
                    imap_host,
                    imap_port,
                    username,
                    password,
                    use_ssl,
                    from: None,
                    skip_tls_verify: false,
                },
            );
        }
        Ok(Self {
            source: ConfigSource::Environment,
            file,
            env_missing,
        })
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn get_account(&self, name: Option<&str>) -> Result<&Account> {
        let name = name
            .or(self.file.default_account.as_deref())
            .unwrap_or(DEFAULT_ACCOUNT);
        if let Some(account) = self.file.accounts.get(name) {
            return Ok(account);
        }
        let mut msg = format!("Account '{}' not found in configuration", name);
        if !self.env_missing.is_empty() {
            msg.push_str(&format!(
                " (missing environment variables: {})",
                self.env_missing.join(", ")
            ));
        }
        Err(MailError::Config(msg))
    }

    pub fn get_all_accounts(&self) -> &BTreeMap<String, Account> {
        &self.file.accounts
    }

    pub fn get_message_preset(&self, name: &str) -> Result<&Preset> {
        self.file
            .presets
            .get(name)
            .ok_or_else(|| MailError::config(format!("Preset '{}' not found in config", name)))
    }

    pub fn get_all_presets(&self) -> &BTreeMap<String, Preset> {
        &self.file.presets
    }

    /// Addresses of a recipient group, `None` when the group is unknown.
    pub fn get_recipients(&self, group: &str) -> Option<&[String]> {
        self.file.recipients.get(group).map(Vec::as_slice)
    }

    pub fn get_all_recipients(&self) -> &BTreeMap<String, Vec<String>> {
        &self.file.recipients
    }

    pub fn get_settings(&self) -> &Settings {
        &self.file.settings
    }

    /// Directory holding HTML templates.
    pub fn template_dir(&self) -> PathBuf {
        let base = match &self.source {
            ConfigSource::File(path) => path.parent().map(Path::to_path_buf),
            _ => None,
        };
        match (&self.file.settings.template_dir, base) {
            (Some(dir), Some(base)) if dir.is_relative() => base.join(dir),
            (Some(dir), _) => dir.clone(),
            (None, Some(base)) => base.join("templates"),
            (None, None) => PathBuf::from("templates"),
        }
    }
}

fn parse_config_file(text: &str) -> std::result::Result<ConfigFile, serde_json::Error> {
    serde_json::from_str(text)
}

fn parse_port(raw: Option<String>, key: &str, default: u16) -> Result<u16> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| MailError::config(format!("{} must be a port number, got '{}'", key, raw))),
    }
}

/// `$XDG_CONFIG_HOME`, else `~/.config`; `None` without either.
fn xdg_config_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
    non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".config")))
}

fn candidates_with<F>(lookup: &F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG), PathBuf::from(LOCAL_CONFIG)];
    if let Some(dir) = xdg_config_dir(lookup) {
        paths.push(dir.join("mailroom").join("config.json"));
    }
    paths
}

pub fn config_path_candidates() -> Vec<PathBuf> {
    candidates_with(&|key: &str| std::env::var(key).ok())
}
