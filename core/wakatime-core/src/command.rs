//! wakatime-cli command line and `--extra-heartbeats` payload.
//!
//! ## Wire contract
//!
//! ```text
//! argv:  <cli> --entity E --time T [--key K] [--lines-in-file N] [--lineno N]
//!        [--cursorpos N] [--alternate-project P] [--alternate-language L]
//!        --plugin "<ide>/<ver> <ide>-wakatime/<plugin>" [--write]
//!        [--is-unsaved-entity] [--category building] [--proxy URL]
//!        [--extra-heartbeats]
//! stdin: [{"entity":..,"timestamp":..,"is_write":..,...}]\n   (extras only)
//! ```
//!
//! The payload is written by hand rather than through serde so the escaping
//! table and the key order match what the CLI has always received.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::heartbeat::Heartbeat;
use crate::proxy::ProxyConfig;

const BUILDING_CATEGORY: &str = "building";
const KEY_MASK: &str = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXX";

/// Identifies the editor and plugin in `--plugin`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginIdentity {
    pub ide_name: String,
    pub ide_version: String,
    pub plugin_version: String,
}

impl PluginIdentity {
    pub fn new(
        ide_name: impl Into<String>,
        ide_version: impl Into<String>,
        plugin_version: impl Into<String>,
    ) -> Self {
        Self {
            ide_name: ide_name.into(),
            ide_version: ide_version.into(),
            plugin_version: plugin_version.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        [&self.ide_name, &self.ide_version, &self.plugin_version]
            .iter()
            .all(|part| !part.trim().is_empty())
    }

    /// `<ide>/<ide-version> <ide>-wakatime/<plugin-version>`, or `None` when
    /// any part is unknown.
    pub fn user_agent(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        Some(format!(
            "{}/{} {}-wakatime/{}",
            self.ide_name, self.ide_version, self.ide_name, self.plugin_version
        ))
    }
}

/// Per-flush inputs that do not come from the heartbeats themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    pub cli_path: PathBuf,
    pub api_key: String,
    pub proxy: Option<ProxyConfig>,
    /// Whether `--lineno`/`--cursorpos` (and their JSON twins) are sent.
    pub send_cursor_telemetry: bool,
}

impl CommandOptions {
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            api_key: String::new(),
            proxy: None,
            send_cursor_telemetry: true,
        }
    }
}

/// A ready-to-spawn command line plus optional stdin payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub argv: Vec<String>,
    pub stdin: Option<String>,
}

impl CliInvocation {
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// The argv with the value after `--key` masked, for logging.
    pub fn redacted_argv(&self) -> Vec<String> {
        let mut previous = "";
        self.argv
            .iter()
            .map(|arg| {
                let out = if previous == "--key" {
                    obfuscate_key(arg)
                } else {
                    arg.clone()
                };
                previous = arg.as_str();
                out
            })
            .collect()
    }
}

/// Builds the command line for `primary` with `extras` batched on stdin.
///
/// Returns `None` when the plugin identity is incomplete; the CLI must not
/// be invoked without `--plugin`.
pub fn build_command(
    primary: &Heartbeat,
    extras: &[Heartbeat],
    identity: &PluginIdentity,
    options: &CommandOptions,
) -> Option<CliInvocation> {
    let user_agent = identity.user_agent()?;

    let mut argv = vec![
        options.cli_path.to_string_lossy().into_owned(),
        "--entity".to_string(),
        primary.entity.clone(),
        "--time".to_string(),
        primary.timestamp.to_string(),
    ];

    if !options.api_key.is_empty() {
        argv.push("--key".to_string());
        argv.push(options.api_key.clone());
    }
    if let Some(stats) = primary.line_stats {
        argv.push("--lines-in-file".to_string());
        argv.push(stats.line_count.to_string());
        if options.send_cursor_telemetry {
            argv.push("--lineno".to_string());
            argv.push(stats.line_number.to_string());
            argv.push("--cursorpos".to_string());
            argv.push(stats.cursor_position.to_string());
        }
    }
    if let Some(project) = &primary.project {
        argv.push("--alternate-project".to_string());
        argv.push(project.clone());
    }
    if let Some(language) = &primary.language {
        argv.push("--alternate-language".to_string());
        argv.push(language.clone());
    }

    argv.push("--plugin".to_string());
    argv.push(user_agent);

    if primary.is_write {
        argv.push("--write".to_string());
    }
    if primary.is_unsaved() {
        argv.push("--is-unsaved-entity".to_string());
    }
    if primary.is_building {
        argv.push("--category".to_string());
        argv.push(BUILDING_CATEGORY.to_string());
    }
    if let Some(proxy) = &options.proxy {
        let url = proxy.to_url();
        tracing::info!(proxy = %url, "Built-in proxy will be used");
        argv.push("--proxy".to_string());
        argv.push(url);
    }

    let stdin = if extras.is_empty() {
        None
    } else {
        argv.push("--extra-heartbeats".to_string());
        Some(heartbeats_json(extras, options.send_cursor_telemetry))
    };

    Some(CliInvocation { argv, stdin })
}

/// Serializes heartbeats as a single-line JSON array.
pub fn heartbeats_json(heartbeats: &[Heartbeat], send_cursor_telemetry: bool) -> String {
    let objects: Vec<String> = heartbeats
        .iter()
        .map(|heartbeat| heartbeat_json(heartbeat, send_cursor_telemetry))
        .collect();
    format!("[{}]", objects.join(","))
}

/// Serializes one heartbeat as a JSON object in the CLI's key order.
pub fn heartbeat_json(heartbeat: &Heartbeat, send_cursor_telemetry: bool) -> String {
    let mut out = String::with_capacity(96 + heartbeat.entity.len());
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "{{\"entity\":\"{}\",\"timestamp\":{},\"is_write\":{}",
        json_escape(&heartbeat.entity),
        heartbeat.timestamp,
        heartbeat.is_write
    );
    if let Some(stats) = heartbeat.line_stats {
        let _ = write!(out, ",\"lines\":{}", stats.line_count);
        if send_cursor_telemetry {
            let _ = write!(
                out,
                ",\"lineno\":{},\"cursorpos\":{}",
                stats.line_number, stats.cursor_position
            );
        }
    }
    if heartbeat.is_unsaved() {
        out.push_str(",\"is_unsaved_entity\":true");
    }
    if heartbeat.is_building {
        let _ = write!(out, ",\"category\":\"{}\"", BUILDING_CATEGORY);
    }
    if let Some(project) = &heartbeat.project {
        let _ = write!(out, ",\"alternate_project\":\"{}\"", json_escape(project));
    }
    if let Some(language) = &heartbeat.language {
        let _ = write!(out, ",\"alternate_language\":\"{}\"", json_escape(language));
    }
    out.push('}');
    out
}

/// JSON string escaping with uppercase `\uXXXX` for control characters,
/// C1 controls and the U+2000..U+20FF punctuation block.
pub fn json_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\u{8}' => escaped.push_str("\\b"),
            '\u{c}' => escaped.push_str("\\f"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}' | '\u{2000}'..='\u{20ff}' => {
                let _ = write!(escaped, "\\u{:04X}", c as u32);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Masks all but the last four characters of an API key.
pub fn obfuscate_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return key.to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", KEY_MASK, tail)
}
