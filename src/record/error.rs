use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record payload is truncated: needed {needed} bytes, {remaining} remain")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),

    #[error("invalid UTF-16 string payload")]
    InvalidString,

    #[error("a record must have between 1 and 3 fields, got {0}")]
    InvalidArity(usize),

    #[error("{0} trailing bytes after the last field")]
    TrailingBytes(usize),
}

pub type RecordResult<T> = Result<T, RecordError>;
