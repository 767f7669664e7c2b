//! QAP1 framing: message headers, command codes, parameter encoding.
//!
//! Every message is a 16-byte little-endian header
//! `[command, length_low, data_offset, length_high]` followed by a payload
//! made of typed parameters, each with a 4-byte header
//! `[type, length (24 bits)]`, or 8 bytes when the `DT_LARGE` flag is set.

use rforecast_core::{Error, Result};

pub const HEADER_LEN: usize = 16;
pub const GREETING_LEN: usize = 32;

// Commands
pub const CMD_LOGIN: i32 = 0x001;
pub const CMD_EVAL: i32 = 0x003;
pub const CMD_CREATE_FILE: i32 = 0x011;
pub const CMD_CLOSE_FILE: i32 = 0x012;
pub const CMD_WRITE_FILE: i32 = 0x014;
pub const CMD_REMOVE_FILE: i32 = 0x015;

// Responses
pub const CMD_RESP: i32 = 0x10000;
pub const RESP_OK: i32 = CMD_RESP | 0x0001;
pub const RESP_ERR: i32 = CMD_RESP | 0x0002;

// Parameter types
pub const DT_STRING: u8 = 4;
pub const DT_BYTESTREAM: u8 = 5;
pub const DT_SEXP: u8 = 10;
pub const DT_LARGE: u8 = 0x40;

// Status codes carried in the top byte of an error response
pub const ERR_AUTH_FAILED: u8 = 0x41;
pub const ERR_CONN_BROKEN: u8 = 0x42;
pub const ERR_INV_CMD: u8 = 0x43;
pub const ERR_INV_PAR: u8 = 0x44;
pub const ERR_R_ERROR: u8 = 0x45;
pub const ERR_IO_ERROR: u8 = 0x46;
pub const ERR_NOT_OPEN: u8 = 0x47;
pub const ERR_ACCESS_DENIED: u8 = 0x48;
pub const ERR_UNSUPPORTED_CMD: u8 = 0x49;
pub const ERR_UNKNOWN_CMD: u8 = 0x4a;
pub const ERR_DATA_OVERFLOW: u8 = 0x4b;
pub const ERR_OBJECT_TOO_BIG: u8 = 0x4c;
pub const ERR_OUT_OF_MEM: u8 = 0x4d;
pub const ERR_SESSION_BUSY: u8 = 0x50;
/// Status Rserve reports when `eval` raised an R error.
pub const ERR_EVAL_FAILED: u8 = 127;

/// Largest response body the client will buffer.
pub const MAX_RESPONSE_LEN: u64 = 256 * 1024 * 1024;

/// Largest length a parameter can carry without the `DT_LARGE` header.
const SMALL_PARAM_MAX: usize = 0xff_fff0;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: i32,
    pub length: u64,
}

impl Header {
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        let command = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let low = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as u64;
        let high = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]) as u64;
        Self {
            command,
            length: low | (high << 32),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.command.to_le_bytes());
        out.extend_from_slice(&(self.length as u32).to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&((self.length >> 32) as u32).to_le_bytes());
    }

    pub fn is_ok(&self) -> bool {
        self.command & 0xf == 1 && self.command & CMD_RESP == CMD_RESP
    }

    pub fn is_error(&self) -> bool {
        self.command & 0xf == 2 && self.command & CMD_RESP == CMD_RESP
    }

    pub fn status(&self) -> u8 {
        ((self.command >> 24) & 0x7f) as u8
    }
}

/// Build a complete message: header plus payload.
pub fn encode_message(command: i32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    Header {
        command,
        length: payload.len() as u64,
    }
    .encode(&mut out);
    out.extend_from_slice(payload);
    out
}

fn encode_param_header(kind: u8, len: usize, out: &mut Vec<u8>) {
    if len > SMALL_PARAM_MAX {
        let len = len as u64;
        out.push(kind | DT_LARGE);
        out.push((len & 0xff) as u8);
        out.push(((len >> 8) & 0xff) as u8);
        out.push(((len >> 16) & 0xff) as u8);
        out.extend_from_slice(&((len >> 24) as u32).to_le_bytes());
    } else {
        out.push(kind);
        out.push((len & 0xff) as u8);
        out.push(((len >> 8) & 0xff) as u8);
        out.push(((len >> 16) & 0xff) as u8);
    }
}

/// `DT_STRING` parameter: NUL-terminated, zero-padded to a multiple of 4.
pub fn encode_string_param(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = (bytes.len() + 1 + 3) & !3;
    let mut out = Vec::with_capacity(8 + padded);
    encode_param_header(DT_STRING, padded, &mut out);
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded - bytes.len(), 0);
    out
}

/// `DT_BYTESTREAM` parameter: raw bytes, unpadded.
pub fn encode_bytes_param(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    encode_param_header(DT_BYTESTREAM, data.len(), &mut out);
    out.extend_from_slice(data);
    out
}

/// Split a parameter off the front of a payload, returning
/// `(type, body, rest)`. The type has `DT_LARGE` cleared.
pub fn split_param(payload: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    if payload.len() < 4 {
        return Err(Error::Protocol("truncated parameter header".into()));
    }
    let kind = payload[0];
    let mut len = payload[1] as u64 | (payload[2] as u64) << 8 | (payload[3] as u64) << 16;
    let mut start: usize = 4;
    if kind & DT_LARGE != 0 {
        if payload.len() < 8 {
            return Err(Error::Protocol("truncated large parameter header".into()));
        }
        let high = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as u64;
        len |= high << 24;
        start = 8;
    }
    let end = usize::try_from(len)
        .ok()
        .and_then(|l| start.checked_add(l))
        .filter(|end| *end <= payload.len())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "parameter length {} exceeds payload of {} bytes",
                len,
                payload.len()
            ))
        })?;
    Ok((kind & !DT_LARGE, &payload[start..end], &payload[end..]))
}

/// Human-readable text for an error status.
pub fn describe_status(status: u8) -> &'static str {
    match status {
        1..=5 => "expression could not be parsed",
        ERR_AUTH_FAILED => "authentication failed",
        ERR_CONN_BROKEN => "connection broken",
        ERR_INV_CMD => "invalid command",
        ERR_INV_PAR => "invalid parameter",
        ERR_R_ERROR => "R error",
        ERR_IO_ERROR => "I/O error on the server",
        ERR_NOT_OPEN => "no file is open",
        ERR_ACCESS_DENIED => "access denied",
        ERR_UNSUPPORTED_CMD => "unsupported command",
        ERR_UNKNOWN_CMD => "unknown command",
        ERR_DATA_OVERFLOW => "data overflow",
        ERR_OBJECT_TOO_BIG => "object too big",
        ERR_OUT_OF_MEM => "server out of memory",
        ERR_SESSION_BUSY => "session busy",
        ERR_EVAL_FAILED => "evaluation failed",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let msg = encode_message(CMD_EVAL, &[1, 2, 3, 4]);
        assert_eq!(msg.len(), HEADER_LEN + 4);
        assert_eq!(&msg[0..4], &[3, 0, 0, 0]);
        assert_eq!(&msg[4..8], &[4, 0, 0, 0]);
        assert_eq!(&msg[8..16], &[0; 8]);
        assert_eq!(&msg[16..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_header_status_bits() {
        let mut raw = [0u8; HEADER_LEN];
        raw[0..4].copy_from_slice(&(RESP_ERR | (127 << 24)).to_le_bytes());
        let header = Header::decode(&raw);
        assert!(header.is_error());
        assert!(!header.is_ok());
        assert_eq!(header.status(), ERR_EVAL_FAILED);

        raw[0..4].copy_from_slice(&RESP_OK.to_le_bytes());
        raw[4..8].copy_from_slice(&12u32.to_le_bytes());
        let header = Header::decode(&raw);
        assert!(header.is_ok());
        assert_eq!(header.length, 12);
    }

    #[test]
    fn test_string_param_padding() {
        // "abc" + NUL = 4 bytes, no extra padding
        let p = encode_string_param("abc");
        assert_eq!(p, vec![DT_STRING, 4, 0, 0, b'a', b'b', b'c', 0]);

        // "abcd" + NUL = 5 bytes, padded to 8
        let p = encode_string_param("abcd");
        assert_eq!(p.len(), 4 + 8);
        assert_eq!(p[1], 8);
        assert_eq!(&p[4..], b"abcd\0\0\0\0");
    }

    #[test]
    fn test_bytes_param() {
        let p = encode_bytes_param(b"1\n2\n3\n");
        assert_eq!(&p[..4], &[DT_BYTESTREAM, 6, 0, 0]);
        assert_eq!(&p[4..], b"1\n2\n3\n");
    }

    #[test]
    fn test_large_param_header() {
        let data = vec![0u8; SMALL_PARAM_MAX + 1];
        let p = encode_bytes_param(&data);
        assert_eq!(p[0], DT_BYTESTREAM | DT_LARGE);
        let (kind, body, rest) = split_param(&p).unwrap();
        assert_eq!(kind, DT_BYTESTREAM);
        assert_eq!(body.len(), data.len());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_split_param_rejects_overrun() {
        let bad = [DT_SEXP, 200, 0, 0, 1, 2];
        assert!(matches!(split_param(&bad), Err(Error::Protocol(_))));
        assert!(split_param(&[DT_SEXP, 0]).is_err());
    }
}
