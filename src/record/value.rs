use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::error::{RecordError, RecordResult};

/// Field types supported by the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Long,
    Double,
    Boolean,
    Date,
    Text,
}

impl DataType {
    /// Serialized size in bytes, `None` for the variable-length `Text`.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Int => Some(4),
            DataType::Long | DataType::Double | DataType::Date => Some(8),
            DataType::Boolean => Some(1),
            DataType::Text => None,
        }
    }

    /// Reads one value of this type from the front of `bytes`, returning
    /// the value and the number of bytes consumed.
    pub fn deserialize(self, bytes: &[u8]) -> RecordResult<(Value, usize)> {
        match self {
            DataType::Int => {
                let raw = take::<4>(bytes)?;
                Ok((Value::Int(i32::from_le_bytes(raw)), 4))
            }
            DataType::Long => {
                let raw = take::<8>(bytes)?;
                Ok((Value::Long(i64::from_le_bytes(raw)), 8))
            }
            DataType::Double => {
                let raw = take::<8>(bytes)?;
                Ok((Value::Double(f64::from_le_bytes(raw)), 8))
            }
            DataType::Boolean => {
                let raw = take::<1>(bytes)?;
                match raw[0] {
                    0 => Ok((Value::Boolean(false), 1)),
                    1 => Ok((Value::Boolean(true), 1)),
                    other => Err(RecordError::InvalidBoolean(other)),
                }
            }
            DataType::Date => {
                let raw = take::<8>(bytes)?;
                Ok((Value::Date(i64::from_le_bytes(raw)), 8))
            }
            DataType::Text => {
                let raw = take::<4>(bytes)?;
                let unit_count =
                    usize::try_from(i32::from_le_bytes(raw)).map_err(|_| RecordError::InvalidString)?;
                let payload_len = unit_count * 2;
                let payload = bytes.get(4..4 + payload_len).ok_or(RecordError::Truncated {
                    needed: 4 + payload_len,
                    remaining: bytes.len(),
                })?;
                let units: Vec<u16> = payload
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let text = String::from_utf16(&units).map_err(|_| RecordError::InvalidString)?;
                Ok((Value::Text(text), 4 + payload_len))
            }
        }
    }
}

fn take<const N: usize>(bytes: &[u8]) -> RecordResult<[u8; N]> {
    let raw = bytes.get(..N).ok_or(RecordError::Truncated {
        needed: N,
        remaining: bytes.len(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(raw);
    Ok(out)
}

/// A typed field value.
///
/// Integers, doubles and dates are stored little-endian. `Date` is epoch
/// milliseconds. `Text` is a 4-byte UTF-16 code unit count followed by the
/// code units themselves, 2 bytes each.
///
/// `Value` carries a total order and a consistent hash so it can serve as a
/// sort or grouping key: doubles compare via `f64::total_cmp` and hash by
/// bit pattern, values of different types compare by type rank.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(i64),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Double(_) => DataType::Double,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::Text(_) => DataType::Text,
        }
    }

    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Text(text) => 4 + 2 * text.encode_utf16().count(),
            other => other.data_type().fixed_size().unwrap_or_default(),
        }
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Long(v) | Value::Date(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Boolean(v) => out.push(u8::from(*v)),
            Value::Text(text) => {
                let units: Vec<u16> = text.encode_utf16().collect();
                out.extend_from_slice(&(units.len() as i32).to_le_bytes());
                for unit in units {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Long(_) => 1,
            Value::Double(_) => 2,
            Value::Boolean(_) => 3,
            Value::Date(_) => 4,
            Value::Text(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Long(v) | Value::Date(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Boolean(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) -> Value {
        let mut bytes = Vec::new();
        value.serialize_into(&mut bytes);
        assert_eq!(bytes.len(), value.serialized_size());
        let (decoded, consumed) = value.data_type().deserialize(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn test_fixed_size_values_roundtrip() {
        assert_eq!(roundtrip(Value::Int(-42)), Value::Int(-42));
        assert_eq!(roundtrip(Value::Long(1 << 40)), Value::Long(1 << 40));
        assert_eq!(roundtrip(Value::Double(2.5)), Value::Double(2.5));
        assert_eq!(roundtrip(Value::Boolean(true)), Value::Boolean(true));
        assert_eq!(
            roundtrip(Value::Date(1_650_000_000_000)),
            Value::Date(1_650_000_000_000)
        );
    }

    #[test]
    fn test_text_layout() {
        let mut bytes = Vec::new();
        Value::Text("Hello".to_string()).serialize_into(&mut bytes);
        assert_eq!(bytes.len(), 4 + 2 * 5);
        assert_eq!(&bytes[..4], &5i32.to_le_bytes());
        assert_eq!(&bytes[4..6], &('H' as u16).to_le_bytes());
    }

    #[test]
    fn test_text_non_ascii_roundtrip() {
        let value = Value::Text("Привет Мир!".to_string());
        assert_eq!(value.serialized_size(), 4 + 2 * 11);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn test_invalid_boolean_byte() {
        assert_eq!(
            DataType::Boolean.deserialize(&[7]),
            Err(RecordError::InvalidBoolean(7))
        );
    }

    #[test]
    fn test_truncated_payload() {
        assert_eq!(
            DataType::Int.deserialize(&[1, 2]),
            Err(RecordError::Truncated {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_double_total_order() {
        assert!(Value::Double(-0.0) < Value::Double(0.0));
        assert!(Value::Double(1.0) < Value::Double(f64::NAN));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_cross_type_order_is_total() {
        let mut values = vec![
            Value::Text("a".to_string()),
            Value::Int(3),
            Value::Boolean(false),
            Value::Int(-1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Int(-1),
                Value::Int(3),
                Value::Boolean(false),
                Value::Text("a".to_string()),
            ]
        );
    }
}
