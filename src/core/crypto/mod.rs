//! Platform payload ciphers and request signing.
//!
//! - `qrc`: QQ Music triple-cipher + deflate lyric payloads
//! - `krc`: Kugou XOR + deflate lyric payloads
//! - `netease`: EAPI / WEAPI request encryption
//!
//! Everything here is a pure function over bytes.

pub mod des;
pub mod krc;
pub mod netease;
pub mod qrc;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::DecryptionError;

const INFLATE_CHUNK: usize = 16 * 1024;

/// Trailing bytes tolerated after a checksummed zlib stream (one cipher block of padding).
const ZLIB_MAX_TRAILING: usize = 7;

/// Inflates a zlib stream, retrying as raw deflate when the zlib framing is rejected.
///
/// The stream must reach its end marker and consume the input; truncated input,
/// trailing garbage or an empty result are errors rather than partial results.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    let out = inflate_stream(data, true).or_else(|zlib_err| {
        inflate_stream(data, false).map_err(|raw_err| {
            DecryptionError::Decompress(format!("zlib: {}; raw: {}", zlib_err, raw_err))
        })
    })?;

    if out.is_empty() {
        return Err(DecryptionError::Decompress("empty deflate stream".to_string()));
    }
    Ok(out)
}

fn inflate_stream(data: &[u8], zlib_header: bool) -> Result<Vec<u8>, String> {
    let mut decoder = Decompress::new(zlib_header);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(INFLATE_CHUNK));

    loop {
        if out.len() == out.capacity() {
            out.reserve(INFLATE_CHUNK);
        }
        let before_in = decoder.total_in();
        let before_out = decoder.total_out();

        let status = decoder
            .decompress_vec(&data[before_in as usize..], &mut out, FlushDecompress::None)
            .map_err(|e| e.to_string())?;

        if status == Status::StreamEnd {
            check_trailing(&data[decoder.total_in() as usize..], zlib_header)?;
            return Ok(out);
        }
        if decoder.total_in() == before_in && decoder.total_out() == before_out {
            return Err("truncated deflate stream".to_string());
        }
    }
}

// raw deflate has no checksum, so only zero padding may follow it
fn check_trailing(rest: &[u8], zlib_header: bool) -> Result<(), String> {
    let allowed = if zlib_header {
        rest.len() <= ZLIB_MAX_TRAILING
    } else {
        rest.iter().all(|b| *b == 0)
    };
    if allowed {
        Ok(())
    } else {
        Err(format!("{} trailing bytes after deflate stream", rest.len()))
    }
}

/// Rejects decoded text carrying control characters no lyric file contains.
pub fn ensure_text(text: &str) -> Result<(), DecryptionError> {
    let garbage = text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'));
    if garbage {
        return Err(DecryptionError::Utf8);
    }
    Ok(())
}
