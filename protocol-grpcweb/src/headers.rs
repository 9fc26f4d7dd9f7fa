//! Textual header block codec.
//!
//! A header block is a sequence of `name: value` lines. The same format
//! carries request headers, response headers, and the payload of a trailer
//! frame.

use crate::error::ParseError;
use crate::metadata::Metadata;
use crate::status::{Code, Status, percent_decode, percent_encode};

/// Reserved trailer carrying the numeric status code.
pub const GRPC_STATUS: &str = "grpc-status";
/// Reserved trailer carrying the percent-encoded status message.
pub const GRPC_MESSAGE: &str = "grpc-message";

/// Encode `metadata` as a header block, one `name: value\r\n` line per value.
///
/// Names must be visible ASCII without `:`; values must not contain `\r` or
/// `\n`. Nothing is written if any entry is invalid.
pub fn encode(metadata: &Metadata, out: &mut Vec<u8>) -> Result<(), ParseError> {
    for (name, value) in metadata.iter() {
        validate(name, value)?;
    }
    for (name, value) in metadata.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    Ok(())
}

fn validate(name: &str, value: &str) -> Result<(), ParseError> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(ParseError::InvalidHeaderName(name.to_string()));
    }
    if value.contains(['\r', '\n']) {
        return Err(ParseError::InvalidHeaderValue(name.to_string()));
    }
    Ok(())
}

/// Parse a header block.
///
/// Accepts `\n` or `\r\n` line endings and skips blank lines. Whitespace
/// around names is trimmed; a value loses only the single space written
/// after the `:`, so any other leading or trailing whitespace is kept.
/// Names are lower-cased.
pub fn parse(block: &[u8]) -> Result<Metadata, ParseError> {
    let text = std::str::from_utf8(block).map_err(|_| ParseError::InvalidUtf8)?;
    let mut metadata = Metadata::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::InvalidHeader(line.to_string()));
        }
        metadata.append(name, value.strip_prefix(' ').unwrap_or(value));
    }

    Ok(metadata)
}

/// Remove the reserved status entries from `metadata` and return them as a
/// [`Status`] alongside the remaining user-visible trailers.
///
/// A missing `grpc-status` means `OK`; one that does not parse as an
/// integer means `UNKNOWN`.
pub fn split_status(mut metadata: Metadata) -> (Status, Metadata) {
    let code = match metadata.remove(GRPC_STATUS) {
        None => Code::Ok,
        Some(values) => values
            .first()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(Code::from_u32)
            .unwrap_or(Code::Unknown),
    };
    let message = metadata
        .remove(GRPC_MESSAGE)
        .and_then(|values| values.into_iter().next())
        .map(|v| percent_decode(&v))
        .unwrap_or_default();

    (Status::new(code, message), metadata)
}

/// Parse a trailer block into its status and user-visible trailers.
pub fn parse_trailers(block: &[u8]) -> Result<(Status, Metadata), ParseError> {
    parse(block).map(split_status)
}

/// Build the trailer metadata for `status`, followed by `trailers`.
pub fn status_trailers(status: &Status, trailers: &Metadata) -> Metadata {
    let mut metadata = Metadata::new().with(GRPC_STATUS, status.code().as_u32().to_string());
    if !status.message().is_empty() {
        metadata.append(GRPC_MESSAGE, percent_encode(status.message()));
    }
    for (name, value) in trailers.iter() {
        metadata.append(name, value);
    }
    metadata
}
