use crate::core::convert::fragment::FragmentationMethod;
use thiserror::Error;

pub const DEFAULT_DIST_TH: f64 = 8.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid interface distance threshold {0} (must be a positive, finite number of Angstroms)")]
    InvalidDistanceThreshold(f64),
}

/// Settings shared by every row of a dataset build.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// Interface distance threshold in Angstroms.
    pub dist_th: f64,
    /// Ligand decomposition; `None` keeps ligands at atom granularity.
    pub fragmentation_method: Option<FragmentationMethod>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            dist_th: DEFAULT_DIST_TH,
            fragmentation_method: None,
        }
    }
}

#[derive(Default)]
pub struct ProcessConfigBuilder {
    dist_th: Option<f64>,
    fragmentation_method: Option<FragmentationMethod>,
}

impl ProcessConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dist_th(mut self, dist_th: f64) -> Self {
        self.dist_th = Some(dist_th);
        self
    }

    pub fn fragmentation_method(mut self, method: Option<FragmentationMethod>) -> Self {
        self.fragmentation_method = method;
        self
    }

    pub fn build(self) -> Result<ProcessConfig, ConfigError> {
        let dist_th = self.dist_th.unwrap_or(DEFAULT_DIST_TH);
        if !dist_th.is_finite() || dist_th <= 0.0 {
            return Err(ConfigError::InvalidDistanceThreshold(dist_th));
        }
        Ok(ProcessConfig {
            dist_th,
            fragmentation_method: self.fragmentation_method,
        })
    }
}
