//! Message envelope framing and server status-code translation.
//!
//! Every exchange on a connection is a header + body + optional error section
//! + optional bulk-stream section. The header is length-prefixed so both ends
//! can frame without knowing the message type up front. The read/write halves
//! are free functions over `AsyncRead`/`AsyncWrite` so tests can drive the
//! server side of the wire as well.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::GridError;

/// Upper bound on a serialized header. A peer sending more than this is not
/// speaking the protocol.
const MAX_HEADER_LEN: u32 = 64 * 1024;

/// Upper bound on any single body/error/bs section (bulk data is chunked by
/// the callers well below this).
const MAX_SECTION_LEN: u32 = 64 * 1024 * 1024;

/// Framing header preceding every message in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Wire name of the operation (request) or of the replied-to operation.
    pub msg_type: String,
    /// Length of the body section in bytes.
    pub body_len: u32,
    /// Length of the error section in bytes.
    pub error_len: u32,
    /// Length of the bulk-stream section in bytes.
    pub bs_len: u32,
    /// Request sequence number on requests; server status on responses
    /// (negative values are error codes).
    pub int_info: i32,
}

/// A fully read message: header plus its three sections.
#[derive(Debug)]
pub struct Envelope {
    pub header: MessageHeader,
    pub body: Bytes,
    pub error: Bytes,
    pub bs: Bytes,
}

impl Envelope {
    /// Translate a negative `int_info` into a typed error, using the error
    /// section as context when the server filled it in.
    pub fn check(self) -> Result<Self, GridError> {
        if self.header.int_info < 0 {
            let context = if self.error.is_empty() {
                self.header.msg_type.clone()
            } else {
                String::from_utf8_lossy(&self.error).into_owned()
            };
            return Err(error_from_code(self.header.int_info, context));
        }
        Ok(self)
    }

    /// Deserialize the body section.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, GridError> {
        serde_json::from_slice(&self.body).map_err(|e| GridError::Server {
            code: 0,
            context: format!("malformed {} response body: {e}", self.header.msg_type),
        })
    }
}

/// Write one message. Returns the total number of bytes put on the wire.
pub async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: &str,
    int_info: i32,
    body: &[u8],
    bs: &[u8],
) -> std::io::Result<u64> {
    write_envelope_with_error(writer, msg_type, int_info, body, &[], bs).await
}

/// Write one message including an error section (server side of a failure).
pub async fn write_envelope_with_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: &str,
    int_info: i32,
    body: &[u8],
    error: &[u8],
    bs: &[u8],
) -> std::io::Result<u64> {
    let header = MessageHeader {
        msg_type: msg_type.to_owned(),
        body_len: body.len() as u32,
        error_len: error.len() as u32,
        bs_len: bs.len() as u32,
        int_info,
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    writer.write_u32(header_bytes.len() as u32).await?;
    writer.write_all(&header_bytes).await?;
    writer.write_all(body).await?;
    writer.write_all(error).await?;
    writer.write_all(bs).await?;
    writer.flush().await?;

    Ok(4 + header_bytes.len() as u64 + body.len() as u64 + error.len() as u64 + bs.len() as u64)
}

/// Read one message. Returns the envelope and the number of bytes consumed.
pub async fn read_envelope<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<(Envelope, u64)> {
    let header_len = reader.read_u32().await?;
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unreasonable header length {header_len}"),
        ));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    reader.read_exact(&mut header_bytes).await?;
    let header: MessageHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    for len in [header.body_len, header.error_len, header.bs_len] {
        if len > MAX_SECTION_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unreasonable section length {len}"),
            ));
        }
    }

    let mut body = vec![0u8; header.body_len as usize];
    reader.read_exact(&mut body).await?;
    let mut error = vec![0u8; header.error_len as usize];
    reader.read_exact(&mut error).await?;
    let mut bs = vec![0u8; header.bs_len as usize];
    reader.read_exact(&mut bs).await?;

    let consumed = 4
        + u64::from(header_len)
        + u64::from(header.body_len)
        + u64::from(header.error_len)
        + u64::from(header.bs_len);

    Ok((
        Envelope {
            header,
            body: Bytes::from(body),
            error: Bytes::from(error),
            bs: Bytes::from(bs),
        },
        consumed,
    ))
}

/// Well-known server status codes.
///
/// The server reports failures as negative integers in `int_info`. The named
/// ones below translate to typed errors; everything else surfaces as
/// [`GridError::Server`].
pub mod code {
    /// No such collection or data object.
    pub const NO_SUCH_PATH: i32 = -310_000;
    /// Target already exists.
    pub const ALREADY_EXISTS: i32 = -312_000;
    /// Request was structurally invalid.
    pub const INVALID_ARGUMENT: i32 = -314_000;
    /// ACL check failed.
    pub const ACCESS_DENIED: i32 = -330_000;
    /// Credentials rejected during the auth ceremony.
    pub const AUTH_FAILED: i32 = -332_000;
    /// Resource quota exceeded.
    pub const QUOTA_EXCEEDED: i32 = -350_000;
    /// Server temporarily overloaded.
    pub const SERVER_BUSY: i32 = -352_000;
    /// Non-recursive delete of a non-empty collection.
    pub const COLLECTION_NOT_EMPTY: i32 = -360_000;
    /// Transport negotiation could not agree on a policy.
    pub const NEGOTIATION_FAILED: i32 = -370_000;
}

/// Translate a server status code into the error taxonomy.
#[must_use]
pub fn error_from_code(status: i32, context: impl Into<String>) -> GridError {
    let context = context.into();
    match status {
        code::NO_SUCH_PATH => GridError::NotFound(context),
        code::ALREADY_EXISTS => GridError::AlreadyExists(context),
        code::INVALID_ARGUMENT => GridError::InvalidArgument(context),
        code::ACCESS_DENIED => GridError::Unauthorized(context),
        code::AUTH_FAILED => GridError::Unauthorized(context),
        code::QUOTA_EXCEEDED => GridError::Quota(context),
        code::SERVER_BUSY => GridError::ServerBusy(context),
        _ => GridError::Server {
            code: status,
            context,
        },
    }
}
