use wakatime_core::TrackerError;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to read editor events: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Failed to write output: {0}")]
    Stdout(#[source] std::io::Error),

    #[error("wakatime-cli not found; pass --cli or set WAKATIME_CLI_LOCATION")]
    CliNotFound,

    #[error("Plugin identity is incomplete; identity flags must not be blank")]
    IncompleteIdentity,

    #[error("Failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Core(#[from] TrackerError),
}
