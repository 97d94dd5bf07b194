//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode commands as RESP2 arrays and decode replies into
//! [`RespValue`], then narrow replies to the shapes collections expect.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes until narrowed.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use std::io::{BufRead, Read};

use crate::error::{ClientError, ClientResult};

/// Replies nested deeper than this are rejected as malformed.
const MAX_DEPTH: usize = 8;

/// Largest bulk string the store will send (`proto-max-bulk-len`).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest element count accepted in one array reply.
const MAX_ARRAY_LEN: i64 = 1024 * 1024 * 1024;

/// Upper bound on buffer space reserved from a length header.
const PREALLOC_LIMIT: usize = 1024;

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for nil.
    Bulk(Option<Vec<u8>>),
    /// *... arrays; a null array decodes as empty.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Narrows an integer reply.
    pub fn into_integer(self) -> ClientResult<i64> {
        match self {
            RespValue::Integer(value) => Ok(value),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Narrows a bulk reply to a UTF-8 string; nil becomes `None`.
    pub fn into_string(self) -> ClientResult<Option<String>> {
        match self {
            RespValue::Bulk(Some(data)) => Ok(Some(String::from_utf8(data)?)),
            RespValue::Bulk(None) => Ok(None),
            RespValue::Simple(text) => Ok(Some(String::from_utf8(text)?)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Narrows an array of bulk strings. Nil entries are skipped.
    pub fn into_strings(self) -> ClientResult<Vec<String>> {
        match self {
            RespValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(text) = item.into_string()? {
                        out.push(text);
                    }
                }
                Ok(out)
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Accepts any status reply (`+OK`, `+QUEUED`, ...).
    pub fn expect_ok(self) -> ClientResult<()> {
        match self {
            RespValue::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Narrows a `SCAN` reply into the next cursor and the page of keys.
    pub fn into_scan_page(self) -> ClientResult<(u64, Vec<String>)> {
        let mut parts = match self {
            RespValue::Array(parts) if parts.len() == 2 => parts.into_iter(),
            _ => return Err(ClientError::UnexpectedResponse),
        };
        let cursor = match parts.next() {
            Some(RespValue::Bulk(Some(data))) => std::str::from_utf8(&data)
                .ok()
                .and_then(|text| text.parse::<u64>().ok())
                .ok_or(ClientError::Protocol)?,
            _ => return Err(ClientError::UnexpectedResponse),
        };
        let keys = match parts.next() {
            Some(page) => page.into_strings()?,
            None => Vec::new(),
        };
        Ok((cursor, keys))
    }
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut Vec<u8>) {
    push_header(out, b'*', args.len());
    for arg in args {
        let arg = arg.as_ref();
        push_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

fn push_header(out: &mut Vec<u8>, marker: u8, len: usize) {
    out.push(marker);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Reads one RESP value from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<RespValue> {
    read_value(reader, line_buf, 0)
}

fn read_value<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> ClientResult<RespValue> {
    if depth > MAX_DEPTH {
        return Err(ClientError::Protocol);
    }
    read_line(reader, line_buf)?;
    let (&marker, rest) = line_buf.split_first().ok_or(ClientError::Protocol)?;

    match marker {
        b'+' => Ok(RespValue::Simple(rest.to_vec())),
        b'-' => Ok(RespValue::Error(rest.to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            if len <= 0 {
                return Ok(RespValue::Array(Vec::new()));
            }
            if len > MAX_ARRAY_LEN {
                return Err(ClientError::Protocol);
            }
            let mut items = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
            for _ in 0..len {
                items.push(read_value(reader, line_buf, depth + 1)?);
            }
            Ok(RespValue::Array(items))
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }
    if len > MAX_BULK_LEN {
        return Err(ClientError::Protocol);
    }
    let mut data = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() as i64 != len {
        return Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )));
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if &crlf != b"\r\n" {
        return Err(ClientError::Protocol);
    }
    Ok(RespValue::Bulk(Some(data)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(ClientError::Protocol)
}
