//! A minimal RESP (REdis Serialization Protocol) decoder/encoder: just
//! enough to read command arrays of bulk strings and write back bulk
//! strings, nils, and simple errors.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

#[derive(Debug, Error)]
pub enum RespError {
    #[error("connection closed")]
    Eof,
    #[error("malformed array header")]
    MalformedArrayHeader,
    #[error("malformed bulk string header")]
    MalformedBulkHeader,
    #[error("bulk string is not valid utf-8")]
    InvalidUtf8,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one command: a RESP array of bulk strings. Returns the decoded
/// arguments, command token first.
pub async fn decode_command<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Vec<String>, RespError> {
    let header = read_line(reader).await?;
    let count: usize = header
        .strip_prefix('*')
        .and_then(|s| s.parse().ok())
        .ok_or(RespError::MalformedArrayHeader)?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(read_bulk_string(reader).await?);
    }
    Ok(args)
}

async fn read_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<String, RespError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(RespError::Eof);
    }
    Ok(line.trim_end().to_string())
}

async fn read_bulk_string<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<String, RespError> {
    let header = read_line(reader).await?;
    let len: usize = header
        .strip_prefix('$')
        .and_then(|s| s.parse().ok())
        .ok_or(RespError::MalformedBulkHeader)?;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;

    String::from_utf8(buf).map_err(|_| RespError::InvalidUtf8)
}

/// `$-1\r\n`, RESP's nil bulk string.
pub const NIL: &str = "$-1\r\n";

pub fn encode_bulk(body: &str) -> String {
    format!("${}\r\n{}\r\n", body.len(), body)
}

pub fn encode_error(message: &str) -> String {
    format!("-err {message}\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn decodes_a_two_element_array() {
        let input = b"*2\r\n$3\r\nGET\r\n$3\r\nk00\r\n".to_vec();
        let mut reader = BufReader::new(&input[..]);
        let args = decode_command(&mut reader).await.unwrap();
        assert_eq!(args, vec!["GET".to_string(), "k00".to_string()]);
    }

    #[tokio::test]
    async fn rejects_a_malformed_header() {
        let input = b"not-an-array\r\n".to_vec();
        let mut reader = BufReader::new(&input[..]);
        assert!(decode_command(&mut reader).await.is_err());
    }

    #[test]
    fn encodes_bulk_strings_and_nil() {
        assert_eq!(encode_bulk("v00"), "$3\r\nv00\r\n");
        assert_eq!(NIL, "$-1\r\n");
        assert_eq!(
            encode_error("unknown command 'set'"),
            "-err unknown command 'set'\r\n"
        );
    }
}
