//! Pipeline configuration loading

use std::path::Path;

use anyhow::Context;
use dash_core::PipelineConfig;

/// Load a TOML config file; missing keys fall back to defaults
///
/// With no path the default configuration is returned.
///
/// # Errors
/// Fails if the file cannot be read, is not valid TOML, or holds values
/// the pipelines reject
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            parse_config(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Parse config text
///
/// # Errors
/// Fails on malformed TOML or mistyped keys
pub fn parse_config(raw: &str) -> anyhow::Result<PipelineConfig> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config("grid_columns = 24\nmin_ready_events = 5\n").unwrap();
        assert_eq!(config.grid_columns, 24);
        assert_eq!(config.min_ready_events, 5);
        assert_eq!(config.grid_gap, PipelineConfig::default().grid_gap);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn mistyped_key_is_rejected() {
        assert!(parse_config("grid_columns = \"wide\"").is_err());
    }

    #[test]
    fn no_path_is_default() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }
}
