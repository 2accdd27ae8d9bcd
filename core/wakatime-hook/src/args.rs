//! Flags shared by every subcommand and their translation into core types.

use std::env;
use std::path::PathBuf;

use clap::Args;
use wakatime_core::config::{DEBUG, SETTINGS_SECTION};
use wakatime_core::{ConfigStore, InstalledCli, MemoryConfigStore, PluginIdentity, ProxyConfig};

const API_KEY_ENV: &str = "WAKATIME_API_KEY";

#[derive(Args, Debug, Clone)]
pub struct PluginArgs {
    /// Path to the wakatime-cli binary (default: $WAKATIME_CLI_LOCATION or ~/.wakatime)
    #[arg(long, value_name = "PATH")]
    pub cli: Option<PathBuf>,

    /// Editor name sent in the plugin user agent (e.g. IC, GoLand)
    #[arg(long)]
    pub ide_name: String,

    /// Editor version
    #[arg(long)]
    pub ide_version: String,

    /// Version of the editor plugin
    #[arg(long)]
    pub plugin_version: String,

    /// WakaTime API key (default: $WAKATIME_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Verbose logging and wait for wakatime-cli output
    #[arg(long)]
    pub debug: bool,

    /// Omit line number and cursor column from heartbeats
    #[arg(long)]
    pub no_cursor_telemetry: bool,

    #[command(flatten)]
    pub proxy: ProxyArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProxyArgs {
    /// Proxy host forwarded to wakatime-cli
    #[arg(long, value_name = "HOST")]
    pub proxy_host: Option<String>,

    #[arg(long, value_name = "PORT", requires = "proxy_host")]
    pub proxy_port: Option<u16>,

    /// Use SOCKS5 instead of HTTPS
    #[arg(long, requires = "proxy_host")]
    pub proxy_socks: bool,

    #[arg(long, value_name = "USER", requires_all = ["proxy_host", "proxy_password"])]
    pub proxy_user: Option<String>,

    #[arg(long, value_name = "PASSWORD", requires = "proxy_user")]
    pub proxy_password: Option<String>,
}

impl PluginArgs {
    pub fn identity(&self) -> PluginIdentity {
        PluginIdentity::new(&self.ide_name, &self.ide_version, &self.plugin_version)
    }

    pub fn send_cursor_telemetry(&self) -> bool {
        !self.no_cursor_telemetry
    }

    pub fn api_key(&self) -> String {
        self.api_key
            .clone()
            .or_else(|| env::var(API_KEY_ENV).ok())
            .unwrap_or_default()
    }

    /// Settings the engine reads on every flush.
    pub fn config_store(&self) -> MemoryConfigStore {
        let store = MemoryConfigStore::with_api_key(&self.api_key());
        if self.debug {
            store.set(SETTINGS_SECTION, DEBUG, "true");
        }
        store
    }

    pub fn locate_cli(&self) -> Option<InstalledCli> {
        match &self.cli {
            Some(path) => Some(InstalledCli::at(path)),
            None => InstalledCli::discover(),
        }
    }

    pub fn proxy(&self) -> Option<ProxyConfig> {
        self.proxy.to_config()
    }
}

impl ProxyArgs {
    fn to_config(&self) -> Option<ProxyConfig> {
        let host = self.proxy_host.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        let login = match (&self.proxy_user, &self.proxy_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };
        Some(ProxyConfig {
            port: self.proxy_port,
            socks: self.proxy_socks,
            login,
            ..ProxyConfig::new(host)
        })
    }
}
