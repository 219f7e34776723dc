//! IEEE 488.2 arbitrary block data: `#<n><n digits of length><payload>`.
//!
//! `n = 0` is the indefinite form, where the payload runs to the end of the
//! message (less the terminating newline).

use std::str;

use crate::errors::{Error, Result};

/// Layout of a block header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockHeader {
	/// Bytes taken by `#`, the digit count and the length digits
	pub header_len: usize,
	/// `None` for an indefinite-length block
	pub payload_len: Option<usize>,
}

fn block_err(msg:&str) -> Error { Error::Block(msg.to_owned()) }

/// Parses the header at the start of `data`. Returns `Ok(None)` if more bytes are needed.
pub fn parse_header(data:&[u8]) -> Result<Option<BlockHeader>> {
	if data.len() < 2 {
		return Ok(None);
	}
	if data[0] != b'#' {
		return Err(block_err("block does not start with '#'"));
	}

	let ndigits:usize = match (data[1] as char).to_digit(10) {
		Some(n) => n as usize,
		None    => return Err(block_err("invalid length digit count")),
	};

	if ndigits == 0 {
		return Ok(Some(BlockHeader{ header_len: 2, payload_len: None }));
	}
	if data.len() < 2 + ndigits {
		return Ok(None);
	}

	let digits:&[u8] = &data[2..2 + ndigits];
	let payload_len:usize = str::from_utf8(digits).ok()
		.filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
		.and_then(|s| s.parse::<usize>().ok())
		.ok_or_else(|| block_err("invalid length field"))?;

	Ok(Some(BlockHeader{ header_len: 2 + ndigits, payload_len: Some(payload_len) }))
}

/// Returns the payload of the complete block in `data`
pub fn parse_block(data:&[u8]) -> Result<&[u8]> {
	let start:usize = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
	let data:&[u8] = &data[start..];

	let header = parse_header(data)?.ok_or_else(|| block_err("truncated header"))?;
	let body:&[u8] = &data[header.header_len..];

	match header.payload_len {
		Some(n) if body.len() < n => Err(Error::Block(format!("expected {} payload bytes, got {}", n, body.len()))),
		Some(n) => Ok(&body[..n]),
		None    => Ok(body.strip_suffix(b"\n").unwrap_or(body)),
	}
}
