//! Field type descriptors and their wire encoding.
//!
//! Every type is a [`FieldType`] value; composite types nest references to
//! other descriptors, so the whole schema lives in `'static` tables.
//! Integers are little-endian.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{Result, SchemaError};
use crate::value::{Record, Value};

/// Largest count a one-byte length prefix can carry.
pub const MAX_PREFIXED_LEN: usize = u8::MAX as usize;

/// Number of counters reported by `readCounters`.
pub const COUNTER_TYPE_COUNT: usize = 40;

/// A named field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: &'static FieldType,
}

/// Shape of one serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Little-endian integer of `width` bytes (1, 2, 3, 4 or 8).
    Int { width: u8, signed: bool },
    /// One length byte followed by that many raw bytes.
    LvBytes,
    /// Exactly `n` elements, no prefix.
    FixedList(usize, &'static FieldType),
    /// One count byte followed by that many elements.
    LvList(&'static FieldType),
    /// uint16 elements with no prefix; decoding consumes the rest of the input.
    WordList,
    /// Fields in declared order.
    Struct(&'static [Field]),
}

pub const U8: FieldType = FieldType::Int {
    width: 1,
    signed: false,
};
pub const U16: FieldType = FieldType::Int {
    width: 2,
    signed: false,
};
pub const U24: FieldType = FieldType::Int {
    width: 3,
    signed: false,
};
pub const U32: FieldType = FieldType::Int {
    width: 4,
    signed: false,
};
pub const U64: FieldType = FieldType::Int {
    width: 8,
    signed: false,
};
pub const I8: FieldType = FieldType::Int {
    width: 1,
    signed: true,
};
pub const I16: FieldType = FieldType::Int {
    width: 2,
    signed: true,
};
pub const I32: FieldType = FieldType::Int {
    width: 4,
    signed: true,
};

pub const BOOL: FieldType = U8;
pub const NODE_ID: FieldType = U16;
pub const PAN_ID: FieldType = U16;
/// IEEE address; the wire form is the reversed byte order of the printed form.
pub const EUI64: FieldType = U64;
pub const EXTENDED_PAN_ID: FieldType = FieldType::FixedList(8, &U8);
pub const TOKEN_DATA: FieldType = FieldType::FixedList(8, &U8);
pub const COUNTERS: FieldType = FieldType::FixedList(COUNTER_TYPE_COUNT, &U16);

pub const KEY_DATA: FieldType = FieldType::Struct(&[Field {
    name: "contents",
    ty: &FieldType::FixedList(16, &U8),
}]);

pub const NETWORK_PARAMETERS: FieldType = FieldType::Struct(&[
    Field {
        name: "extendedPanId",
        ty: &EXTENDED_PAN_ID,
    },
    Field {
        name: "panId",
        ty: &PAN_ID,
    },
    Field {
        name: "radioTxPower",
        ty: &U8,
    },
    Field {
        name: "radioChannel",
        ty: &U8,
    },
    Field {
        name: "joinMethod",
        ty: &U8,
    },
    Field {
        name: "nwkManagerId",
        ty: &NODE_ID,
    },
    Field {
        name: "nwkUpdateId",
        ty: &U8,
    },
    Field {
        name: "channels",
        ty: &U32,
    },
]);

pub const ZIGBEE_NETWORK: FieldType = FieldType::Struct(&[
    Field {
        name: "channel",
        ty: &U8,
    },
    Field {
        name: "panId",
        ty: &PAN_ID,
    },
    Field {
        name: "extendedPanId",
        ty: &EXTENDED_PAN_ID,
    },
    Field {
        name: "allowingJoin",
        ty: &BOOL,
    },
    Field {
        name: "stackProfile",
        ty: &U8,
    },
    Field {
        name: "nwkUpdateId",
        ty: &U8,
    },
]);

pub const APS_FRAME: FieldType = FieldType::Struct(&[
    Field {
        name: "profileId",
        ty: &U16,
    },
    Field {
        name: "clusterId",
        ty: &U16,
    },
    Field {
        name: "sourceEndpoint",
        ty: &U8,
    },
    Field {
        name: "destinationEndpoint",
        ty: &U8,
    },
    Field {
        name: "options",
        ty: &U16,
    },
    Field {
        name: "groupId",
        ty: &U16,
    },
    Field {
        name: "sequence",
        ty: &U8,
    },
]);

pub const INITIAL_SECURITY_STATE: FieldType = FieldType::Struct(&[
    Field {
        name: "bitmask",
        ty: &U16,
    },
    Field {
        name: "preconfiguredKey",
        ty: &KEY_DATA,
    },
    Field {
        name: "networkKey",
        ty: &KEY_DATA,
    },
    Field {
        name: "networkKeySequenceNumber",
        ty: &U8,
    },
    Field {
        name: "preconfiguredTrustCenterEui64",
        ty: &EUI64,
    },
]);

pub const CURRENT_SECURITY_STATE: FieldType = FieldType::Struct(&[
    Field {
        name: "bitmask",
        ty: &U16,
    },
    Field {
        name: "trustCenterLongAddress",
        ty: &EUI64,
    },
]);

impl FieldType {
    /// Serialize `value` onto `out`.
    ///
    /// Fails without writing a partial integer when the value has the wrong
    /// shape or does not fit; earlier fields of a record may already be
    /// written.
    pub fn encode<B: BufMut>(&self, value: &Value, out: &mut B) -> Result<()> {
        match *self {
            FieldType::Int { width, signed } => encode_int(self, width, signed, value, out),
            FieldType::LvBytes => {
                let bytes = byte_string(value)?;
                if bytes.len() > MAX_PREFIXED_LEN {
                    return Err(SchemaError::LengthOverflow {
                        len: bytes.len(),
                        max: MAX_PREFIXED_LEN,
                    });
                }
                out.put_u8(bytes.len() as u8);
                out.put_slice(&bytes);
                Ok(())
            }
            FieldType::FixedList(n, elem) => {
                if let (Value::Bytes(bytes), FieldType::Int { width: 1, .. }) = (value, elem) {
                    if bytes.len() != n {
                        return Err(SchemaError::FixedLength {
                            expected: n,
                            actual: bytes.len(),
                        });
                    }
                    out.put_slice(bytes);
                    return Ok(());
                }
                let items = list(value)?;
                if items.len() != n {
                    return Err(SchemaError::FixedLength {
                        expected: n,
                        actual: items.len(),
                    });
                }
                items.iter().try_for_each(|item| elem.encode(item, out))
            }
            FieldType::LvList(elem) => {
                let items = list(value)?;
                if items.len() > MAX_PREFIXED_LEN {
                    return Err(SchemaError::LengthOverflow {
                        len: items.len(),
                        max: MAX_PREFIXED_LEN,
                    });
                }
                out.put_u8(items.len() as u8);
                items.iter().try_for_each(|item| elem.encode(item, out))
            }
            FieldType::WordList => list(value)?
                .iter()
                .try_for_each(|item| U16.encode(item, out)),
            FieldType::Struct(fields) => match value {
                Value::Record(record) => encode_fields(fields, record, out),
                other => Err(SchemaError::TypeMismatch {
                    expected: "record",
                    found: other.kind(),
                }),
            },
        }
    }

    /// Deserialize one value from the front of `buf`.
    pub fn decode<B: Buf>(&self, buf: &mut B) -> Result<Value> {
        match *self {
            FieldType::Int { width, signed } => {
                let width = usize::from(width);
                need(buf, width)?;
                if signed {
                    Ok(Value::Int(buf.get_int_le(width)))
                } else {
                    Ok(Value::UInt(buf.get_uint_le(width)))
                }
            }
            FieldType::LvBytes => {
                need(buf, 1)?;
                let len = usize::from(buf.get_u8());
                need(buf, len)?;
                let mut bytes = vec![0u8; len];
                buf.copy_to_slice(&mut bytes);
                Ok(Value::Bytes(bytes))
            }
            FieldType::FixedList(n, elem) => {
                let items = (0..n)
                    .map(|_| elem.decode(buf))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(items))
            }
            FieldType::LvList(elem) => {
                need(buf, 1)?;
                let count = usize::from(buf.get_u8());
                let items = (0..count)
                    .map(|_| elem.decode(buf))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(items))
            }
            FieldType::WordList => {
                let mut items = Vec::with_capacity(buf.remaining() / 2);
                while buf.has_remaining() {
                    need(buf, 2)?;
                    items.push(Value::UInt(u64::from(buf.get_u16_le())));
                }
                Ok(Value::List(items))
            }
            FieldType::Struct(fields) => decode_fields(fields, buf).map(Value::Record),
        }
    }

    /// Fixed encoded size, if the type has one.
    pub fn fixed_size(&self) -> Option<usize> {
        match *self {
            FieldType::Int { width, .. } => Some(usize::from(width)),
            FieldType::FixedList(n, elem) => elem.fixed_size().map(|size| size * n),
            FieldType::Struct(fields) => fields.iter().map(|f| f.ty.fixed_size()).sum(),
            FieldType::LvBytes | FieldType::LvList(_) | FieldType::WordList => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int { width, signed } => {
                let prefix = if *signed { "int" } else { "uint" };
                write!(f, "{prefix}{}", u32::from(*width) * 8)
            }
            FieldType::LvBytes => f.write_str("LVBytes"),
            FieldType::FixedList(n, elem) => write!(f, "{elem}[{n}]"),
            FieldType::LvList(elem) => write!(f, "LVList<{elem}>"),
            FieldType::WordList => f.write_str("WordList"),
            FieldType::Struct(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Encode `record` field by field in declared order.
pub fn encode_fields<B: BufMut>(fields: &[Field], record: &Record, out: &mut B) -> Result<()> {
    for field in fields {
        let value = record
            .get(field.name)
            .ok_or(SchemaError::MissingField(field.name))?;
        field.ty.encode(value, out)?;
    }
    Ok(())
}

/// Decode a record field by field in declared order.
pub fn decode_fields<B: Buf>(fields: &[Field], buf: &mut B) -> Result<Record> {
    let mut record = Record::with_capacity(fields.len());
    for field in fields {
        record.push(field.name, field.ty.decode(buf)?);
    }
    Ok(record)
}

fn need<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(SchemaError::Underrun {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn encode_int<B: BufMut>(
    ty: &FieldType,
    width: u8,
    signed: bool,
    value: &Value,
    out: &mut B,
) -> Result<()> {
    let raw = match value {
        Value::Int(v) => i128::from(*v),
        Value::UInt(v) => i128::from(*v),
        other => {
            return Err(SchemaError::TypeMismatch {
                expected: "integer",
                found: other.kind(),
            })
        }
    };
    let bits = u32::from(width) * 8;
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if raw < min || raw > max {
        return Err(SchemaError::OutOfRange {
            value: raw,
            type_name: ty.to_string(),
        });
    }
    // Two's complement truncation keeps the low `width` bytes.
    out.put_uint_le(raw as u64, usize::from(width));
    Ok(())
}

fn list(value: &Value) -> Result<&[Value]> {
    value.as_list().ok_or(SchemaError::TypeMismatch {
        expected: "list",
        found: value.kind(),
    })
}

fn byte_string(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::List(items) => items
            .iter()
            .map(|item| match item.as_u64() {
                Some(byte) if byte <= 0xFF => Ok(byte as u8),
                _ => Err(SchemaError::TypeMismatch {
                    expected: "byte",
                    found: item.kind(),
                }),
            })
            .collect(),
        other => Err(SchemaError::TypeMismatch {
            expected: "bytes",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ty: &FieldType, value: Value) -> Vec<u8> {
        let mut out = Vec::new();
        ty.encode(&value, &mut out).unwrap();
        out
    }

    #[test]
    fn test_integers_are_little_endian() {
        assert_eq!(encode(&U16, Value::UInt(0x1234)), vec![0x34, 0x12]);
        assert_eq!(encode(&U24, Value::UInt(0x0A0B0C)), vec![0x0C, 0x0B, 0x0A]);
        assert_eq!(
            encode(&U32, Value::UInt(0xDEADBEEF)),
            vec![0xEF, 0xBE, 0xAD, 0xDE]
        );
        assert_eq!(encode(&I8, Value::Int(-1)), vec![0xFF]);
        assert_eq!(encode(&I16, Value::Int(-2)), vec![0xFE, 0xFF]);

        let mut buf: &[u8] = &[0xFE, 0xFF, 0x9C];
        assert_eq!(I16.decode(&mut buf).unwrap(), Value::Int(-2));
        assert_eq!(I8.decode(&mut buf).unwrap(), Value::Int(-100));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_eui64_is_reversed_bytes() {
        let out = encode(&EUI64, Value::UInt(0x0011_2233_4455_6677));
        assert_eq!(out, vec![0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
    }

    #[test]
    fn test_integer_range_checked() {
        let mut out = Vec::new();
        let err = U8.encode(&Value::UInt(256), &mut out).unwrap_err();
        assert!(matches!(err, SchemaError::OutOfRange { value: 256, .. }));
        assert!(out.is_empty());

        assert!(U16.encode(&Value::Int(-1), &mut out).is_err());
        assert!(I8.encode(&Value::Int(128), &mut out).is_err());
        assert!(I8.encode(&Value::Int(-128), &mut out).is_ok());
        assert!(U64.encode(&Value::UInt(u64::MAX), &mut out).is_ok());
    }

    #[test]
    fn test_integer_rejects_bytes() {
        let err = U8.encode(&Value::Bytes(vec![1]), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::TypeMismatch {
                expected: "integer",
                found: "bytes"
            }
        ));
    }

    #[test]
    fn test_lv_bytes() {
        assert_eq!(
            encode(&FieldType::LvBytes, Value::Bytes(vec![0xAA, 0xBB])),
            vec![0x02, 0xAA, 0xBB]
        );
        let mut buf: &[u8] = &[0x03, 0x01, 0x02, 0x03, 0xFF];
        assert_eq!(
            FieldType::LvBytes.decode(&mut buf).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
        assert_eq!(buf, &[0xFF]);
    }

    #[test]
    fn test_lv_bytes_too_long() {
        let err = FieldType::LvBytes
            .encode(&Value::Bytes(vec![0; 256]), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::LengthOverflow { len: 256, max: 255 }
        ));
    }

    #[test]
    fn test_lv_bytes_underrun() {
        let mut buf: &[u8] = &[0x04, 0x01];
        let err = FieldType::LvBytes.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Underrun {
                needed: 4,
                remaining: 1
            }
        ));
    }

    #[test]
    fn test_fixed_list_length_enforced() {
        let err = EXTENDED_PAN_ID
            .encode(&Value::Bytes(vec![0; 7]), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::FixedLength {
                expected: 8,
                actual: 7
            }
        ));

        let mut buf: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9];
        let value = EXTENDED_PAN_ID.decode(&mut buf).unwrap();
        assert_eq!(value.as_list().unwrap().len(), 8);
        assert_eq!(buf, &[9]);
    }

    #[test]
    fn test_lv_list() {
        let ty = FieldType::LvList(&U16);
        let value = Value::List(vec![Value::UInt(0x0006), Value::UInt(0x0500)]);
        let out = encode(&ty, value.clone());
        assert_eq!(out, vec![0x02, 0x06, 0x00, 0x00, 0x05]);
        assert_eq!(ty.decode(&mut out.as_slice()).unwrap(), value);
    }

    #[test]
    fn test_word_list_has_no_prefix_and_consumes_rest() {
        let value = Value::List(vec![Value::UInt(0x0006), Value::UInt(0x0008)]);
        assert_eq!(
            encode(&FieldType::WordList, value.clone()),
            vec![0x06, 0x00, 0x08, 0x00]
        );

        let mut buf: &[u8] = &[0x06, 0x00, 0x08, 0x00];
        assert_eq!(FieldType::WordList.decode(&mut buf).unwrap(), value);
        assert!(buf.is_empty());

        let mut odd: &[u8] = &[0x06, 0x00, 0x08];
        assert!(FieldType::WordList.decode(&mut odd).is_err());
    }

    #[test]
    fn test_struct_fields_in_declared_order() {
        let mut buf: &[u8] = &[
            0x04, 0x01, 0x06, 0x00, 0x01, 0x01, 0x40, 0x01, 0x00, 0x00, 0x2A,
        ];
        let value = APS_FRAME.decode(&mut buf).unwrap();
        let record = value.as_record().unwrap();
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "profileId",
                "clusterId",
                "sourceEndpoint",
                "destinationEndpoint",
                "options",
                "groupId",
                "sequence"
            ]
        );
        assert_eq!(record.get_u64("profileId"), Some(0x0104));
        assert_eq!(record.get_u64("options"), Some(0x0140));
        assert_eq!(record.get_u64("sequence"), Some(0x2A));

        let out = encode(&APS_FRAME, value);
        assert_eq!(out.len(), 11);
    }

    #[test]
    fn test_struct_missing_field() {
        let record = Record::new().with("bitmask", 0u16);
        let err = CURRENT_SECURITY_STATE
            .encode(&Value::Record(record), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingField("trustCenterLongAddress")
        ));
    }

    #[test]
    fn test_nested_struct_underrun() {
        let mut buf: &[u8] = &[0x00, 0x00, 0x01, 0x02];
        let err = INITIAL_SECURITY_STATE.decode(&mut buf).unwrap_err();
        assert!(matches!(err, SchemaError::Underrun { .. }));
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(APS_FRAME.fixed_size(), Some(11));
        assert_eq!(NETWORK_PARAMETERS.fixed_size(), Some(20));
        assert_eq!(KEY_DATA.fixed_size(), Some(16));
        assert_eq!(INITIAL_SECURITY_STATE.fixed_size(), Some(43));
        assert_eq!(FieldType::LvBytes.fixed_size(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(U16.to_string(), "uint16");
        assert_eq!(I8.to_string(), "int8");
        assert_eq!(TOKEN_DATA.to_string(), "uint8[8]");
        assert_eq!(
            CURRENT_SECURITY_STATE.to_string(),
            "{bitmask: uint16, trustCenterLongAddress: uint64}"
        );
    }
}
