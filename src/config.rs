///! Run configuration: settings file, CLI arguments, credentials.

use std::fmt;
use std::path::PathBuf;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Optional settings file looked up in the working directory.
pub const CONFIG_FILE: &str = "ddns-renew.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_login_url")]
    pub login_url: String,

    #[serde(default = "default_hosts_url")]
    pub hosts_url: String,

    #[serde(default = "default_dns_records_url")]
    pub dns_records_url: String,

    #[serde(default = "default_scheduler_script")]
    pub scheduler_script: PathBuf,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_login_url() -> String {
    "https://www.noip.com/login".to_string()
}

fn default_hosts_url() -> String {
    "https://my.noip.com/#!/dynamic-dns".to_string()
}

fn default_dns_records_url() -> String {
    "https://www.noip.com/members/dns/".to_string()
}

fn default_scheduler_script() -> PathBuf {
    PathBuf::from("/usr/local/bin/ddns-renew-skd.sh")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}

// Extended timeout for slow single-board hosts.
fn default_page_load_timeout_secs() -> u64 {
    90
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.14; rv:64.0) Gecko/20100101 Firefox/64.0"
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            hosts_url: default_hosts_url(),
            dns_records_url: default_dns_records_url(),
            scheduler_script: default_scheduler_script(),
            snapshot_dir: default_snapshot_dir(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path}"))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {path}"))?;
        Ok(settings)
    }

    /// Load [`CONFIG_FILE`] from the working directory when present,
    /// otherwise fall back to the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        if std::path::Path::new(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)
        } else {
            Ok(Self::default())
        }
    }
}

/// Verbosity and snapshot-capture level: 0 = silent, 1 = log lines,
/// 2 and above also captures snapshots at the gated checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DebugLevel(u8);

impl DebugLevel {
    pub fn new(level: u8) -> Self {
        Self(level)
    }

    pub fn snapshots_enabled(self) -> bool {
        self.0 >= 2
    }

    /// Default `tracing` filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self.0 {
            0 => "off",
            1 => "info",
            _ => "debug",
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account credentials as given on the command line. The password stays in
/// its encoded form until the moment it is typed into the login form.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    encoded_password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, encoded_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            encoded_password: encoded_password.into(),
        }
    }

    /// Decode the base64-encoded password.
    pub fn decode_password(&self) -> anyhow::Result<String> {
        let bytes = BASE64
            .decode(self.encoded_password.as_bytes())
            .context("Password is not valid base64")?;
        String::from_utf8(bytes).context("Decoded password is not valid UTF-8")
    }
}

// The password must never reach logs or snapshots, in either form.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("encoded_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub credentials: Credentials,
    pub debug: DebugLevel,
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <username> <password-base64> [<debug-level>]")
}

impl CliArgs {
    /// Parse `argv` (program name first). Two positionals are required; the
    /// debug level defaults to 1 and must parse as an integer.
    pub fn parse(argv: &[String]) -> Result<Self, String> {
        let program = argv.first().map(String::as_str).unwrap_or("ddns-renew");
        if argv.len() < 3 {
            return Err(usage(program));
        }

        let debug = match argv.get(3) {
            Some(raw) => raw
                .parse::<u8>()
                .map(DebugLevel::new)
                .map_err(|_| usage(program))?,
            None => DebugLevel::new(1),
        };

        Ok(Self {
            credentials: Credentials::new(argv[1].clone(), argv[2].clone()),
            debug,
        })
    }
}
