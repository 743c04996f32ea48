mod error;
mod tuple;
mod value;

pub use error::{RecordError, RecordResult};
pub use tuple::{MAX_FIELD_COUNT, MIN_FIELD_COUNT, Record};
pub use value::{DataType, Value};
