//! The RESP (REdis Serialization Protocol) wire format.
//!
//! [`Value`] is the tagged representation of anything the server can send
//! back; [`check`]/[`parse`] form the two-pass incremental decoder used by
//! [`crate::connection`], and [`encode_command`] is the only encoder this
//! client ever needs, since every outbound command is an array of bulk
//! strings.

use bytes::{Buf, Bytes, BytesMut};
use std::convert::TryInto;
use std::io::Cursor;

/// Any value the server can send over RESP.
///
/// Null bulk strings and null arrays are distinct from empty ones, matching
/// the wire format exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    BulkString(Option<Bytes>),
    Array(Option<Vec<Value>>),
}

/// A decode failure.
pub(crate) enum CodecError {
    /// Not enough data is buffered yet to parse a complete value.
    Incomplete,
    /// The buffered bytes do not form a valid RESP value.
    Invalid(String),
}

impl From<CodecError> for crate::error::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Incomplete => {
                crate::error::Error::Protocol("incomplete frame treated as fatal".into())
            }
            CodecError::Invalid(msg) => crate::error::Error::Protocol(msg),
        }
    }
}

/// Returns `Ok(())` if a complete value starts at the cursor's current
/// position, without allocating anything to hold it. Leaves the cursor
/// positioned just past the value on success; position is unspecified on
/// `Err`.
pub(crate) fn check(src: &mut Cursor<&[u8]>) -> Result<(), CodecError> {
    match get_u8(src)? {
        b'+' | b'-' => {
            get_line(src)?;
            Ok(())
        }
        b':' => {
            get_signed_decimal(src)?;
            Ok(())
        }
        b'$' => {
            if peek_u8(src)? == b'-' {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err(CodecError::Invalid("invalid null bulk string".into()));
                }
                Ok(())
            } else {
                let len: usize = get_unsigned_decimal(src)?
                    .try_into()
                    .map_err(|_| CodecError::Invalid("bulk string length overflow".into()))?;
                skip(src, len + 2)
            }
        }
        b'*' => {
            if peek_u8(src)? == b'-' {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err(CodecError::Invalid("invalid null array".into()));
                }
                return Ok(());
            }

            let len = get_unsigned_decimal(src)?;
            for _ in 0..len {
                check(src)?;
            }
            Ok(())
        }
        other => Err(CodecError::Invalid(format!(
            "invalid frame type byte `{}`",
            other as char
        ))),
    }
}

/// Parses a complete value starting at the cursor's current position. Only
/// call this after [`check`] has confirmed a full value is buffered.
pub(crate) fn parse(src: &mut Cursor<&[u8]>) -> Result<Value, CodecError> {
    match get_u8(src)? {
        b'+' => Ok(Value::SimpleString(Bytes::copy_from_slice(get_line(src)?))),
        b'-' => Ok(Value::Error(Bytes::copy_from_slice(get_line(src)?))),
        b':' => Ok(Value::Integer(get_signed_decimal(src)?)),
        b'$' => {
            if peek_u8(src)? == b'-' {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err(CodecError::Invalid("invalid null bulk string".into()));
                }
                Ok(Value::BulkString(None))
            } else {
                let len: usize = get_unsigned_decimal(src)?
                    .try_into()
                    .map_err(|_| CodecError::Invalid("bulk string length overflow".into()))?;
                let n = len + 2;

                if src.remaining() < n {
                    return Err(CodecError::Incomplete);
                }

                let data = Bytes::copy_from_slice(&src.chunk()[..len]);
                skip(src, n)?;

                Ok(Value::BulkString(Some(data)))
            }
        }
        b'*' => {
            if peek_u8(src)? == b'-' {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err(CodecError::Invalid("invalid null array".into()));
                }
                return Ok(Value::Array(None));
            }

            let len = get_unsigned_decimal(src)?;
            let mut out = Vec::with_capacity(len as usize);
            for _ in 0..len {
                out.push(parse(src)?);
            }
            Ok(Value::Array(Some(out)))
        }
        other => Err(CodecError::Invalid(format!(
            "invalid frame type byte `{}`",
            other as char
        ))),
    }
}

/// Attempts to decode one [`Value`] from the front of `buf`. On success, the
/// consumed bytes are removed from `buf`. Returns `Ok(None)` if `buf` does
/// not yet hold a complete value.
pub(crate) fn decode(buf: &mut BytesMut) -> Result<Option<Value>, CodecError> {
    let mut cursor = Cursor::new(&buf[..]);

    match check(&mut cursor) {
        Ok(()) => {
            let len = cursor.position() as usize;
            cursor.set_position(0);
            let value = parse(&mut cursor)?;
            buf.advance(len);
            Ok(Some(value))
        }
        Err(CodecError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encodes a command as a RESP array of bulk strings: `*N\r\n` followed by
/// `$L\r\n<bytes>\r\n` per argument. This is the only value shape the client
/// ever writes to the socket.
pub(crate) fn encode_command(args: &[Bytes]) -> BytesMut {
    let mut out = BytesMut::with_capacity(32 + args.iter().map(|a| a.len() + 16).sum::<usize>());

    out.extend_from_slice(b"*");
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");

    for arg in args {
        out.extend_from_slice(b"$");
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }

    out
}

fn peek_u8(src: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if !src.has_remaining() {
        return Err(CodecError::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if !src.has_remaining() {
        return Err(CodecError::Incomplete);
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), CodecError> {
    if src.remaining() < n {
        return Err(CodecError::Incomplete);
    }
    src.advance(n);
    Ok(())
}

/// Scans for a `\r\n`-terminated line starting at the cursor's current
/// position and returns the bytes before it (excluding the terminator),
/// advancing the cursor past the `\n`.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], CodecError> {
    let start = src.position() as usize;
    let buf = src.get_ref();

    if buf.is_empty() {
        return Err(CodecError::Incomplete);
    }
    let end = buf.len() - 1;

    for i in start..end {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&buf[start..i]);
        }
    }

    Err(CodecError::Incomplete)
}

fn get_unsigned_decimal(src: &mut Cursor<&[u8]>) -> Result<u64, CodecError> {
    use atoi::atoi;

    let line = get_line(src)?;
    atoi::<u64>(line).ok_or_else(|| CodecError::Invalid("invalid length".into()))
}

fn get_signed_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, CodecError> {
    use atoi::atoi;

    let line = get_line(src)?;
    atoi::<i64>(line).ok_or_else(|| CodecError::Invalid("invalid integer".into()))
}
