/// All errors that can occur within stoat.
///
/// This enum captures every failure mode: invalid configuration, missing or
/// empty source directories, undecodable image files, and parallel arrays
/// falling out of sync. Using a single error type across the workspace
/// simplifies error propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option was given a value outside its domain, or two options were
    /// combined inconsistently. Always raised before any directory scan or
    /// file I/O takes place.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The dataset root does not exist or is not a directory.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: String },

    /// The dataset root contains no class subdirectories.
    #[error("no class subdirectories found under {path}")]
    EmptyDataset { path: String },

    /// The file's codec is not recognized by the decoder.
    #[error("unsupported image format for {path}: {detail}")]
    UnsupportedFormat { path: String, detail: String },

    /// The file was recognized but could not be decoded.
    #[error("failed to decode {path}: {detail}")]
    Decode { path: String, detail: String },

    /// Two arrays that must stay index-aligned have different lengths.
    #[error("length mismatch: {left} {left_name} vs {right} {right_name}")]
    LengthMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },

    /// An I/O error, annotated with the path being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Annotate an `io::Error` with the path that produced it.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Convenience Result type used throughout stoat.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
