use super::error::{RecordError, RecordResult};
use super::value::{DataType, Value};

pub const MIN_FIELD_COUNT: usize = 1;
pub const MAX_FIELD_COUNT: usize = 3;

/// A typed record of one to three fields.
///
/// The byte form is the plain concatenation of the serialized field values,
/// no header and no padding, so decoding always needs the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> RecordResult<Self> {
        if !(MIN_FIELD_COUNT..=MAX_FIELD_COUNT).contains(&values.len()) {
            return Err(RecordError::InvalidArity(values.len()));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn schema(&self) -> Vec<DataType> {
        self.values.iter().map(Value::data_type).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let size = self.values.iter().map(Value::serialized_size).sum();
        let mut out = Vec::with_capacity(size);
        for value in &self.values {
            value.serialize_into(&mut out);
        }
        out
    }

    /// Decodes a record of the given schema. The payload must be consumed
    /// exactly, trailing bytes are an error.
    pub fn from_bytes(schema: &[DataType], bytes: &[u8]) -> RecordResult<Self> {
        if !(MIN_FIELD_COUNT..=MAX_FIELD_COUNT).contains(&schema.len()) {
            return Err(RecordError::InvalidArity(schema.len()));
        }
        let mut offset = 0;
        let mut values = Vec::with_capacity(schema.len());
        for data_type in schema {
            let (value, consumed) = data_type.deserialize(&bytes[offset..])?;
            offset += consumed;
            values.push(value);
        }
        if offset != bytes.len() {
            return Err(RecordError::TrailingBytes(bytes.len() - offset));
        }
        Ok(Self { values })
    }
}
