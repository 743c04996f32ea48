use thiserror::Error;

use crate::storage::PageError;

use super::Oid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("table {0:?} does not exist")]
    TableNotFound(String),

    #[error("table {0:?} already exists")]
    TableAlreadyExists(String),

    #[error("directory page overflow for table {0}")]
    DirectoryOverflow(Oid),

    #[error(transparent)]
    Page(#[from] PageError),
}

pub type AccessResult<T> = Result<T, AccessError>;
