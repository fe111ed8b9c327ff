use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Renormalization was requested but the incoming map shares no valid
    /// pixel with what is already filled. Recoverable.
    #[error("no overlapping valid pixels for map {index}")]
    EmptyOverlap { index: usize },

    #[error("singular weighted design matrix in region {pattern:#b} (frequencies {freqs:?})")]
    SingularMatrix { pattern: u32, freqs: Vec<usize> },

    #[error("{0} axis is not strictly monotonic")]
    NonMonotonicAxis(&'static str),

    #[error("nside {0} is not a power of two")]
    InvalidNside(usize),

    #[error("{0} is not a valid HEALPix pixel count")]
    InvalidNpix(usize),

    #[error("frequency {0} GHz is already in the catalog")]
    DuplicateFrequency(f64),

    #[error("{k} incomplete frequencies exceeds the supported maximum of {max}")]
    TooManyIncompleteFrequencies { k: usize, max: usize },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    #[error(transparent)]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
