//! Decoding of serialized R objects (QAP1 `XT_*` expressions) into `RValue`.

use rforecast_core::{Error, Result};
use rforecast_session::RValue;

pub const XT_NULL: u8 = 0;
pub const XT_INT: u8 = 1;
pub const XT_DOUBLE: u8 = 2;
pub const XT_STR: u8 = 3;
pub const XT_SYM: u8 = 5;
pub const XT_BOOL: u8 = 6;
pub const XT_VECTOR: u8 = 16;
pub const XT_SYMNAME: u8 = 19;
pub const XT_LIST_NOTAG: u8 = 20;
pub const XT_LIST_TAG: u8 = 21;
pub const XT_LANG_NOTAG: u8 = 22;
pub const XT_LANG_TAG: u8 = 23;
pub const XT_VECTOR_EXP: u8 = 26;
pub const XT_VECTOR_STR: u8 = 27;
pub const XT_ARRAY_INT: u8 = 32;
pub const XT_ARRAY_DOUBLE: u8 = 33;
pub const XT_ARRAY_STR: u8 = 34;
pub const XT_ARRAY_BOOL_UA: u8 = 35;
pub const XT_ARRAY_BOOL: u8 = 36;

pub const XT_LARGE: u8 = 0x40;
pub const XT_HAS_ATTR: u8 = 0x80;

/// R's integer NA.
pub const NA_INTEGER: i32 = i32::MIN;
/// Byte R uses for a logical NA in packed boolean arrays.
pub const NA_LOGICAL_BYTE: u8 = 2;
/// Lead byte Rserve uses for a character NA.
const NA_STRING_BYTE: u8 = 0xff;

const MAX_DEPTH: usize = 64;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Protocol(format!(
                "expression truncated: wanted {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let buf = self.buf;
        let slice = &buf[self.pos..];
        self.pos = buf.len();
        slice
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode the body of a `DT_SEXP` parameter.
pub fn decode(buf: &[u8]) -> Result<RValue> {
    let mut cursor = Cursor::new(buf);
    decode_at(&mut cursor, 0)
}

fn decode_at(cursor: &mut Cursor<'_>, depth: usize) -> Result<RValue> {
    if depth > MAX_DEPTH {
        return Err(Error::Protocol("expression nested too deeply".into()));
    }

    let head = cursor.u8()?;
    let len_bytes = cursor.take(3)?;
    let mut len = len_bytes[0] as u64 | (len_bytes[1] as u64) << 8 | (len_bytes[2] as u64) << 16;
    if head & XT_LARGE != 0 {
        len |= (cursor.u32()? as u64) << 24;
    }
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("expression length {} too large", len)))?;
    let body = cursor.take(len)?;
    let mut inner = Cursor::new(body);

    if head & XT_HAS_ATTR != 0 {
        // class, names, tsp and friends are not surfaced
        decode_at(&mut inner, depth + 1)?;
    }

    let kind = head & 0x3f;
    let value = match kind {
        XT_NULL => RValue::Null,
        XT_INT | XT_ARRAY_INT => RValue::Integer(
            inner
                .rest()
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .map(|i| (i != NA_INTEGER).then_some(i))
                .collect(),
        ),
        XT_DOUBLE | XT_ARRAY_DOUBLE => RValue::Double(
            inner
                .rest()
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
        ),
        XT_STR | XT_ARRAY_STR | XT_SYMNAME | XT_SYM => RValue::Str(decode_strings(inner.rest())),
        XT_ARRAY_BOOL => {
            let n = inner.u32()? as usize;
            let bytes = inner.take(n)?;
            RValue::Logical(bytes.iter().map(|b| logical(*b)).collect())
        }
        XT_BOOL => RValue::Logical(vec![logical(inner.u8()?)]),
        XT_ARRAY_BOOL_UA => RValue::Logical(
            inner
                .rest()
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .map(|i| match i {
                    0 => Some(false),
                    1 => Some(true),
                    _ => None,
                })
                .collect(),
        ),
        XT_VECTOR | XT_VECTOR_EXP | XT_VECTOR_STR | XT_LIST_NOTAG | XT_LANG_NOTAG => {
            let mut items = Vec::new();
            while inner.remaining() > 0 {
                items.push(decode_at(&mut inner, depth + 1)?);
            }
            RValue::List(items)
        }
        XT_LIST_TAG | XT_LANG_TAG => {
            let mut items = Vec::new();
            while inner.remaining() > 0 {
                items.push(decode_at(&mut inner, depth + 1)?);
                // tag
                decode_at(&mut inner, depth + 1)?;
            }
            RValue::List(items)
        }
        other => RValue::Unsupported(other),
    };
    Ok(value)
}

fn logical(byte: u8) -> Option<bool> {
    match byte {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// NUL-separated strings; trailing `0x01` padding after the last NUL is
/// ignored.
fn decode_strings(buf: &[u8]) -> Vec<Option<String>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, b) in buf.iter().enumerate() {
        if *b == 0 {
            let raw = &buf[start..i];
            if raw == [NA_STRING_BYTE] {
                out.push(None);
            } else {
                out.push(Some(String::from_utf8_lossy(raw).into_owned()));
            }
            start = i + 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sexp(kind: u8, body: &[u8]) -> Vec<u8> {
        let len = body.len();
        let mut out = vec![kind, len as u8, (len >> 8) as u8, (len >> 16) as u8];
        out.extend_from_slice(body);
        out
    }

    fn doubles(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_null() {
        assert_eq!(decode(&sexp(XT_NULL, &[])).unwrap(), RValue::Null);
    }

    #[test]
    fn test_double_array() {
        let buf = sexp(XT_ARRAY_DOUBLE, &doubles(&[101.5, 99.25, 103.0]));
        assert_eq!(
            decode(&buf).unwrap(),
            RValue::Double(vec![101.5, 99.25, 103.0])
        );
    }

    #[test]
    fn test_int_array_with_na() {
        let mut body = Vec::new();
        body.extend_from_slice(&7i32.to_le_bytes());
        body.extend_from_slice(&NA_INTEGER.to_le_bytes());
        assert_eq!(
            decode(&sexp(XT_ARRAY_INT, &body)).unwrap(),
            RValue::Integer(vec![Some(7), None])
        );
    }

    #[test]
    fn test_bool_array() {
        // n = 3, then TRUE FALSE NA, padded to 4
        let mut body = 3u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[1, 0, NA_LOGICAL_BYTE, 0xff]);
        assert_eq!(
            decode(&sexp(XT_ARRAY_BOOL, &body)).unwrap(),
            RValue::Logical(vec![Some(true), Some(false), None])
        );
    }

    #[test]
    fn test_string_array_with_padding_and_na() {
        let body = b"R version 4.3.2\0\xff\0\x01\x01";
        assert_eq!(
            decode(&sexp(XT_ARRAY_STR, body)).unwrap(),
            RValue::Str(vec![Some("R version 4.3.2".into()), None])
        );
    }

    #[test]
    fn test_attributes_are_skipped() {
        // ts object: double array carrying a tagged attribute list
        let tsp = sexp(XT_ARRAY_DOUBLE, &doubles(&[1.0, 2.0, 12.0]));
        let tag = sexp(XT_SYMNAME, b"tsp\0");
        let mut attr_body = tsp;
        attr_body.extend_from_slice(&tag);
        let attrs = sexp(XT_LIST_TAG, &attr_body);

        let mut body = attrs;
        body.extend_from_slice(&doubles(&[5.0, 6.0]));
        let buf = sexp(XT_ARRAY_DOUBLE | XT_HAS_ATTR, &body);

        assert_eq!(decode(&buf).unwrap(), RValue::Double(vec![5.0, 6.0]));
    }

    #[test]
    fn test_generic_vector() {
        let mut body = sexp(XT_ARRAY_DOUBLE, &doubles(&[1.0]));
        body.extend_from_slice(&sexp(XT_NULL, &[]));
        assert_eq!(
            decode(&sexp(XT_VECTOR, &body)).unwrap(),
            RValue::List(vec![RValue::Double(vec![1.0]), RValue::Null])
        );
    }

    #[test]
    fn test_unsupported_type() {
        // XT_CLOS
        assert_eq!(decode(&sexp(18, &[0; 4])).unwrap(), RValue::Unsupported(18));
    }

    #[test]
    fn test_truncated_body() {
        let mut buf = sexp(XT_ARRAY_DOUBLE, &doubles(&[1.0, 2.0]));
        buf.truncate(10);
        assert!(matches!(decode(&buf), Err(Error::Protocol(_))));
    }
}
