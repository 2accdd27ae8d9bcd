//! `print-command`: show what one flush would hand to wakatime-cli.
//!
//! Every event becomes a heartbeat (no throttling); the first is the
//! primary and the rest ride along as extra heartbeats. The API key is
//! masked in the printed argv.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde::Serialize;
use wakatime_core::cli::binary_name;
use wakatime_core::{
    build_command, should_log, CliLocator, CommandOptions, EditorEvent, Heartbeat, PluginIdentity,
};

use crate::args::PluginArgs;
use crate::error::HookError;
use crate::input::for_each_event;

#[derive(Debug, Serialize)]
struct PrintedCommand {
    argv: Vec<String>,
    stdin: Option<String>,
}

pub fn run(args: &PluginArgs) -> Result<(), HookError> {
    let stdin = io::stdin();
    let heartbeats = collect_heartbeats(stdin.lock())?;

    let cli_path = args
        .locate_cli()
        .map(|cli| cli.executable_path())
        .unwrap_or_else(|| PathBuf::from(binary_name()));
    let options = CommandOptions {
        cli_path,
        api_key: args.api_key(),
        proxy: args.proxy(),
        send_cursor_telemetry: args.send_cursor_telemetry(),
    };

    match render(&heartbeats, &args.identity(), &options)? {
        Some(rendered) => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", rendered).map_err(HookError::Stdout)?;
        }
        None => tracing::info!("No heartbeats in input; nothing to print"),
    }
    Ok(())
}

fn collect_heartbeats(reader: impl BufRead) -> Result<Vec<Heartbeat>, HookError> {
    let mut building = false;
    let mut heartbeats = Vec::new();

    for_each_event(reader, |event| {
        match event {
            EditorEvent::BuildStart(_) => building = true,
            EditorEvent::BuildEnd => building = false,
            _ => {}
        }
        let is_write = event.is_write();
        let Some(activity) = event.activity().cloned() else {
            return;
        };
        if !should_log(&activity.file) {
            return;
        }
        let mut heartbeat = activity.into_input(is_write).into_heartbeat(building);
        heartbeat.resolve_unsaved_entity();
        heartbeats.push(heartbeat);
    })?;

    Ok(heartbeats)
}

fn render(
    heartbeats: &[Heartbeat],
    identity: &PluginIdentity,
    options: &CommandOptions,
) -> Result<Option<String>, HookError> {
    let Some((primary, extras)) = heartbeats.split_first() else {
        return Ok(None);
    };
    let invocation =
        build_command(primary, extras, identity, options).ok_or(HookError::IncompleteIdentity)?;
    let printed = PrintedCommand {
        argv: invocation.redacted_argv(),
        stdin: invocation.stdin,
    };
    serde_json::to_string_pretty(&printed)
        .map(Some)
        .map_err(HookError::Encode)
}
