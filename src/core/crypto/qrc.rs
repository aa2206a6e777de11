use data_encoding::{HEXUPPER, HEXUPPER_PERMISSIVE};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use tracing::debug;

use super::des::{Mode, TripleDes};
use super::{ensure_text, inflate};
use crate::error::DecryptionError;

const QRC_KEY: &[u8; 24] = b"!@#)(*$%123ZXC!@!@#)(NHL";

/// Decrypts a hex-encoded QRC payload into its UTF-8 text.
pub fn decrypt(encrypted_hex: &str) -> Result<String, DecryptionError> {
    decrypt_with_key(encrypted_hex, QRC_KEY)
}

fn decrypt_with_key(encrypted_hex: &str, key: &[u8; 24]) -> Result<String, DecryptionError> {
    let encrypted = HEXUPPER_PERMISSIVE
        .decode(encrypted_hex.trim().as_bytes())
        .map_err(|e| DecryptionError::InvalidHex(e.to_string()))?;

    let cipher = TripleDes::new(key, Mode::Decrypt);
    let decrypted = cipher.crypt_ecb(&encrypted);
    debug!("QRC: decrypted {} of {} bytes", decrypted.len(), encrypted.len());

    let inflated = inflate(&decrypted)?;
    let text = String::from_utf8(inflated).map_err(|_| DecryptionError::Utf8)?;
    ensure_text(&text)?;

    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

/// Produces a payload `decrypt` accepts: zlib, zero-padded to the block size, encrypted, uppercase hex.
pub fn encrypt(plaintext: &str) -> Result<String, DecryptionError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(plaintext.as_bytes())
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let mut compressed = encoder
        .finish()
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;

    let padded_len = compressed.len().div_ceil(8) * 8;
    compressed.resize(padded_len, 0);

    let cipher = TripleDes::new(QRC_KEY, Mode::Encrypt);
    Ok(HEXUPPER.encode(&cipher.crypt_ecb(&compressed)))
}
