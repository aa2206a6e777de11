use data_encoding::BASE64;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use super::{ensure_text, inflate};
use crate::error::DecryptionError;

const KRC_KEY: [u8; 16] = [
    0x40, 0x47, 0x61, 0x77, 0x5e, 0x32, 0x74, 0x47, 0x51, 0x36, 0x31, 0x2d, 0xce, 0xd2, 0x6e, 0x69,
];

const KRC_HEADER: &[u8; 4] = b"krc1";

/// Decrypts a base64 KRC payload into its lyric text.
pub fn decrypt(encrypted_b64: &str) -> Result<String, DecryptionError> {
    decrypt_with_key(encrypted_b64, &KRC_KEY)
}

fn decrypt_with_key(encrypted_b64: &str, key: &[u8; 16]) -> Result<String, DecryptionError> {
    let compact: String = encrypted_b64.chars().filter(|c| !c.is_whitespace()).collect();
    let mut data = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| DecryptionError::InvalidBase64(e.to_string()))?;

    if data.len() <= KRC_HEADER.len() {
        return Err(DecryptionError::TooShort { len: data.len() });
    }

    let mut body = data.split_off(KRC_HEADER.len());
    for (i, byte) in body.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }

    let inflated = inflate(&body)?;
    let text = String::from_utf8(inflated).map_err(|_| DecryptionError::Utf8)?;
    ensure_text(&text)?;

    // the platform encoder emits one leading marker character
    let mut chars = text.chars();
    chars.next();
    let lyric = chars.as_str();
    if lyric.is_empty() {
        return Err(DecryptionError::Decompress("no lyric after marker".to_string()));
    }
    Ok(lyric.to_string())
}

/// Inverse of `decrypt`, including the leading marker character.
pub fn encrypt(plaintext: &str) -> Result<String, DecryptionError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(format!("\u{feff}{}", plaintext).as_bytes())
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let mut body = encoder
        .finish()
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;

    for (i, byte) in body.iter_mut().enumerate() {
        *byte ^= KRC_KEY[i % KRC_KEY.len()];
    }

    let mut payload = KRC_HEADER.to_vec();
    payload.extend_from_slice(&body);
    Ok(BASE64.encode(&payload))
}
