//! Orchestrator configuration for the console harness.
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, an optional JSON file (`--config`), then individual flags.

use std::path::Path;

use parley_voice::OrchestratorConfig;
use parley_voice::config::validate_config;

use crate::error::CliError;
use crate::parser::Cli;

/// Load the JSON config file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig, CliError> {
    let Some(path) = path else {
        return Ok(OrchestratorConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
    let config = serde_json::from_str(&raw)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), "Loaded orchestrator config");
    Ok(config)
}

/// Overlay command-line flags on `config`.
pub fn apply_overrides(config: &mut OrchestratorConfig, cli: &Cli) {
    if let Some(mode) = cli.mode {
        config.silence.mode = mode.into();
    }
    if let Some(threshold) = cli.threshold {
        config.silence.custom_threshold_secs = Some(threshold);
    }
    if let Some(name) = &cli.assistant_name {
        config.echo.assistant_name.clone_from(name);
    }
    if cli.auto_listen {
        config.auto_listen = true;
    }
}

/// Resolve and validate the effective configuration.
pub fn resolve(cli: &Cli) -> Result<OrchestratorConfig, CliError> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use parley_voice::SilenceMode;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::parse_from(["parley"]);
        let config = resolve(&cli).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config(r#"{ "silence": { "mode": "patient" }, "context_turns": 2 }"#);
        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.silence.mode, SilenceMode::Patient);
        assert_eq!(config.context_turns, 2);
        assert_eq!(config.timings, OrchestratorConfig::default().timings);
    }

    #[test]
    fn test_flags_override_file() {
        let file = write_config(r#"{ "silence": { "mode": "patient" } }"#);
        let path = file.path().to_str().unwrap();
        let cli = Cli::parse_from([
            "parley",
            "--config",
            path,
            "--mode",
            "continuous",
            "--threshold",
            "6.5",
            "--assistant-name",
            "Ada",
            "--auto-listen",
        ]);

        let config = resolve(&cli).unwrap();
        assert_eq!(config.silence.mode, SilenceMode::Continuous);
        assert_eq!(config.silence.custom_threshold_secs, Some(6.5));
        assert_eq!(config.echo.assistant_name, "Ada");
        assert!(config.auto_listen);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cli = Cli::parse_from(["parley", "--threshold", "0.1"]);
        let err = resolve(&cli).unwrap_err();
        assert!(matches!(err, CliError::Config(_)), "got {err:?}");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let file = write_config("{ not json");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
        assert_eq!(err.exit_code(), 74);
    }
}
