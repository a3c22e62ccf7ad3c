use std::fmt;

/// Error types for reading measurement files and writing spreadsheets
#[derive(Debug)]
pub enum ConvertError {
    /// I/O errors
    Io(std::io::Error),
    /// Wrong command-line usage, carries the usage line
    Usage(String),
    /// Input is unreadable or not a recognized container format
    FileFormat(String),
    /// Container version outside the supported range
    UnsupportedVersion(String),
    /// End of block or data reached unexpectedly
    UnexpectedEof,
    /// Feature of the container that this reader does not decode
    Unsupported(String),
    /// Output could not be written
    Write(String),
    /// CSV parsing errors
    Csv(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Io(err) => write!(f, "I/O error: {}", err),
            ConvertError::Usage(usage) => write!(f, "{}", usage),
            ConvertError::FileFormat(msg) => write!(f, "File format error: {}", msg),
            ConvertError::UnsupportedVersion(version) => {
                write!(f, "Unsupported MDF version: {}", version)
            }
            ConvertError::UnexpectedEof => write!(f, "Unexpected end of file"),
            ConvertError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            ConvertError::Write(msg) => write!(f, "Write error: {}", msg),
            ConvertError::Csv(msg) => write!(f, "CSV error: {}", msg),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ConvertError::UnexpectedEof
        } else {
            ConvertError::Io(err)
        }
    }
}

impl From<csv::Error> for ConvertError {
    fn from(err: csv::Error) -> Self {
        ConvertError::Csv(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ConvertError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ConvertError::Write(err.to_string())
    }
}

impl ConvertError {
    /// True for errors raised while opening or decoding the input
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ConvertError::Io(_)
                | ConvertError::FileFormat(_)
                | ConvertError::UnsupportedVersion(_)
                | ConvertError::UnexpectedEof
                | ConvertError::Unsupported(_)
                | ConvertError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
