use super::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Invalid model configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("The model expects '{0}' in the batch but none were provided")]
    MissingBlockEmbeddings(&'static str),

    #[error(
        "A prediction model must not add denoising noise (atom={atom}, translation={translation}, rotation={rotation}, torsion={torsion})"
    )]
    NoisyPredictionModel {
        atom: f64,
        translation: f64,
        rotation: f64,
        torsion: f64,
    },

    #[error("Shape mismatch for parameter '{name}': model has {expected:?}, checkpoint has {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
