use thiserror::Error;

/// Problems with the run configuration
///
/// All of these are fatal: they are detected before the first record
/// is processed and abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("B-tag thresholds must be finite and strictly increasing, got loose={loose}, medium={medium}, tight={tight}")]
    BTagOrder { loose: f64, medium: f64, tight: f64 },

    #[error("Unknown b-tagging working point: {0} (available: L, M, T)")]
    UnknownWorkingPoint(String),

    #[error("Sum of weights must be finite and non-zero for simulated samples, got {0}")]
    SumOfWeights(f64),

    #[error("Record source lacks required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{stage} is enabled but no {tool} was supplied")]
    MissingTool {
        stage: &'static str,
        tool: &'static str,
    },
}

/// Problems accessing the columns of a single record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadError {
    #[error("Entry {entry} out of range, source has {len} records")]
    EntryOutOfRange { entry: usize, len: usize },

    #[error("Field {0} is missing from the record")]
    MissingField(String),

    #[error("Field {field} has type {found}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field {field} has {found} entries, expected {expected} like the other {category} arrays")]
    LengthMismatch {
        category: &'static str,
        field: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

pub type Result<T> = std::result::Result<T, Error>;
