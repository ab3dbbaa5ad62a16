use std::path::Path;

/// Result alias that carries the custom [`ArenaError`] type.
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The named entry exists neither as a loose file nor in `GLOBAL.BSA`.
    #[error("`{0}` not found in the virtual filesystem")]
    NotFound(String),
    /// A text file failed to parse; carries the 1-based line number.
    #[error("{file}: {message} (line {line})")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    /// A binary file does not match its expected layout.
    #[error("{file}: {message}")]
    Malformed { file: String, message: String },
    /// The file uses an encoding this crate does not decode.
    #[error("{file}: unsupported encoding: {encoding}")]
    UnsupportedEncoding { file: String, encoding: String },
}

impl ArenaError {
    /// Creates an [`ArenaError::Malformed`] for the given source file.
    pub fn malformed(file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Malformed {
            file: file.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Creates an [`ArenaError::UnsupportedEncoding`] for the given source file.
    pub fn unsupported(file: impl AsRef<Path>, encoding: impl Into<String>) -> Self {
        Self::UnsupportedEncoding {
            file: file.as_ref().display().to_string(),
            encoding: encoding.into(),
        }
    }

    /// Creates an [`ArenaError::Parse`] for the given source file and line.
    pub fn parse(file: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.as_ref().display().to_string(),
            line,
            message: message.into(),
        }
    }
}
