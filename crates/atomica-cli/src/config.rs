use crate::cli::ProcessArgs;
use crate::error::{CliError, Result};
use atomica::core::convert::fragment::FragmentationMethod;
use atomica::workflows::config::{ProcessConfig, ProcessConfigBuilder};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Processing options read from a TOML file; every field is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub process: Option<FileProcessConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileProcessConfig {
    #[serde(rename = "dist-th")]
    pub dist_th: Option<f64>,
    #[serde(rename = "fragmentation-method")]
    pub fragmentation_method: Option<FragmentationMethod>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file {:?}", path);
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

/// Command-line values win over the file, which wins over the library defaults.
pub fn build_process_config(args: &ProcessArgs) -> Result<ProcessConfig> {
    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let file_process = file_config.process.unwrap_or_default();
    let defaults = ProcessConfig::default();

    let config = ProcessConfigBuilder::new()
        .dist_th(
            args.dist_th
                .or(file_process.dist_th)
                .unwrap_or(defaults.dist_th),
        )
        .fragmentation_method(
            args.fragmentation
                .or(file_process.fragmentation_method)
                .or(defaults.fragmentation_method),
        )
        .build()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: Option<PathBuf>, dist_th: Option<f64>) -> ProcessArgs {
        ProcessArgs {
            index: PathBuf::from("index.csv"),
            out: PathBuf::from("items.jsonl"),
            config,
            dist_th,
            fragmentation: None,
        }
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = build_process_config(&args(None, None)).unwrap();
        assert_eq!(config, ProcessConfig::default());
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atomica.toml");
        std::fs::write(
            &path,
            "[process]\ndist-th = 5.0\nfragmentation-method = \"motif\"\n",
        )
        .unwrap();

        let from_file = build_process_config(&args(Some(path.clone()), None)).unwrap();
        assert_eq!(from_file.dist_th, 5.0);
        assert_eq!(
            from_file.fragmentation_method,
            Some(FragmentationMethod::Motif)
        );

        let overridden = build_process_config(&args(Some(path), Some(6.0))).unwrap();
        assert_eq!(overridden.dist_th, 6.0);
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atomica.toml");
        std::fs::write(&path, "[process]\ncutoff = 5.0\n").unwrap();
        assert!(matches!(
            build_process_config(&args(Some(path), None)),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn invalid_threshold_is_a_config_error() {
        assert!(matches!(
            build_process_config(&args(None, Some(-1.0))),
            Err(CliError::Config(_))
        ));
    }
}
