use thiserror::Error;

use super::RecordId;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    #[error("Not enough free space on page: need {needed} bytes, {free} available")]
    OutOfSpace { needed: usize, free: usize },

    #[error("Record id {record_id} is out of range: directory size is {directory_size}")]
    OutOfRange {
        record_id: RecordId,
        directory_size: usize,
    },
}

pub type PageResult<T> = Result<T, PageError>;
