mod disk;
mod error;
mod page;

pub use disk::{BulkWriter, DiskEmulator, SharedStorage};
pub use error::{PageError, PageResult};
pub use page::{DiskPage, RecordData};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
pub type PageId = u32;

/// Zero-based index of a record within a page's directory
pub type RecordId = usize;
