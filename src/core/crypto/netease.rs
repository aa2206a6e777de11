//! Netease Cloud Music request encryption.
//!
//! EAPI: md5-signed composite string under AES-128-ECB, hex uppercase.
//! WEAPI: double AES-128-CBC with a random session secret that is itself
//! RSA-encrypted (raw modular exponentiation, no padding).

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use data_encoding::{BASE64, HEXLOWER, HEXUPPER, HEXUPPER_PERMISSIVE};
use num_bigint::BigUint;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use url::Url;

use crate::error::DecryptionError;

type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
#[cfg(test)]
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const EAPI_KEY: &[u8; 16] = b"e82ckenh8dichen8";
const EAPI_SEPARATOR: &str = "-36cd479b6b5-";

const WEAPI_NONCE: &[u8; 16] = b"0CoJUm6Qyw8W8jud";
const WEAPI_IV: &[u8; 16] = b"0102030405060708";
const WEAPI_PUB_EXPONENT: &str = "010001";
const WEAPI_MODULUS: &str = "00e0b509f6259df8642dbc35662901477df22677ec152b5ff68ace615bb7b725152b3ab17a876aea8a5aa76d2e417629ec4ee341f56135fccf695280104e0312ecbda92557c93870114af6c9d05c4f7f0c3685b7a46bee255932575cce10b424d813cfe4875d3e82047b97ddef52741d546b8e289dc6935b3ece0462db0a22b8e7";
const ENC_SEC_KEY_WIDTH: usize = 256;

/// An EAPI-signed request: the rewritten URL plus the `params` form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapiRequest {
    pub url: String,
    pub params: String,
}

/// WEAPI form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeapiForm {
    pub params: String,
    #[serde(rename = "encSecKey")]
    pub enc_sec_key: String,
}

/// Signs `body` for `url` (`http://music.163.com/api/...`) and moves it under `/eapi/`.
pub fn eapi_encrypt<T: Serialize>(url: &str, body: &T) -> Result<EapiRequest, DecryptionError> {
    let text = serde_json::to_string(body).map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let parsed = Url::parse(url).map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let path = parsed.path();

    let digest = format!("{:x}", md5::compute(format!("nobody{}use{}md5forencrypt", path, text)));
    let data = format!("{path}{sep}{text}{sep}{digest}", sep = EAPI_SEPARATOR);

    let sealed = Aes128EcbEnc::new(EAPI_KEY.into()).encrypt_padded_vec_mut::<Pkcs7>(data.as_bytes());

    Ok(EapiRequest {
        url: url.replacen("/api/", "/eapi/", 1),
        params: HEXUPPER.encode(&sealed),
    })
}

/// Decrypts an EAPI hex blob (requests or `e_r` responses) back to its text.
pub fn eapi_decrypt(hex: &str) -> Result<String, DecryptionError> {
    let sealed = HEXUPPER_PERMISSIVE
        .decode(hex.trim().as_bytes())
        .map_err(|e| DecryptionError::InvalidHex(e.to_string()))?;
    let plain = Aes128EcbDec::new(EAPI_KEY.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&sealed)
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    String::from_utf8(plain).map_err(|_| DecryptionError::Utf8)
}

/// Encrypts `body` for a `/weapi/` endpoint with a fresh random secret.
pub fn weapi_encrypt<T: Serialize>(body: &T) -> Result<WeapiForm, DecryptionError> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    weapi_encrypt_with_secret(body, secret.as_bytes())
}

pub(crate) fn weapi_encrypt_with_secret<T: Serialize>(
    body: &T,
    secret: &[u8],
) -> Result<WeapiForm, DecryptionError> {
    let text = serde_json::to_string(body).map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let secret: &[u8; 16] = secret
        .try_into()
        .map_err(|_| DecryptionError::Cipher("weapi secret must be 16 bytes".to_string()))?;

    let first = aes_cbc_base64(text.as_bytes(), WEAPI_NONCE);
    let params = aes_cbc_base64(first.as_bytes(), secret);

    Ok(WeapiForm {
        params,
        enc_sec_key: rsa_encrypt_secret(secret)?,
    })
}

fn aes_cbc_base64(data: &[u8], key: &[u8; 16]) -> String {
    let sealed = Aes128CbcEnc::new(key.into(), WEAPI_IV.into()).encrypt_padded_vec_mut::<Pkcs7>(data);
    BASE64.encode(&sealed)
}

fn rsa_encrypt_secret(secret: &[u8]) -> Result<String, DecryptionError> {
    let reversed: Vec<u8> = secret.iter().rev().copied().collect();
    let parse = |hex: &str, what: &str| {
        BigUint::parse_bytes(hex.as_bytes(), 16)
            .ok_or_else(|| DecryptionError::Cipher(format!("invalid RSA {}", what)))
    };

    let message = parse(&HEXLOWER.encode(&reversed), "message")?;
    let exponent = parse(WEAPI_PUB_EXPONENT, "exponent")?;
    let modulus = parse(WEAPI_MODULUS, "modulus")?;

    let encrypted = message.modpow(&exponent, &modulus).to_str_radix(16);
    Ok(format!("{:0>width$}", encrypted, width = ENC_SEC_KEY_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cbc_decrypt_base64(data: &str, key: &[u8; 16]) -> Vec<u8> {
        let sealed = BASE64.decode(data.as_bytes()).unwrap();
        Aes128CbcDec::new(key.into(), WEAPI_IV.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&sealed)
            .unwrap()
    }

    #[test]
    fn test_eapi_round_trip() {
        let body = json!({"id": "186016", "lv": -1, "tv": -1});
        let request = eapi_encrypt("http://music.163.com/api/song/lyric", &body).unwrap();

        assert_eq!(request.url, "http://music.163.com/eapi/song/lyric");
        assert!(request.params.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        let plain = eapi_decrypt(&request.params).unwrap();
        let parts: Vec<&str> = plain.split(EAPI_SEPARATOR).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "/api/song/lyric");
        assert_eq!(parts[1], r#"{"id":"186016","lv":-1,"tv":-1}"#);

        let expected = format!("{:x}", md5::compute(format!("nobody{}use{}md5forencrypt", parts[0], parts[1])));
        assert_eq!(parts[2], expected);
    }

    #[test]
    fn test_weapi_round_trip() {
        let body = json!({"id": 186016, "lv": -1, "tv": -1});
        let form = weapi_encrypt_with_secret(&body, b"abcdefghijklmnop").unwrap();

        let outer = cbc_decrypt_base64(&form.params, b"abcdefghijklmnop");
        let inner = cbc_decrypt_base64(std::str::from_utf8(&outer).unwrap(), WEAPI_NONCE);
        assert_eq!(inner, serde_json::to_string(&body).unwrap().as_bytes());

        assert_eq!(form.enc_sec_key.len(), ENC_SEC_KEY_WIDTH);
        assert!(form.enc_sec_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_weapi_secret_is_deterministic_in_key() {
        let body = json!({"s": "x"});
        let a = weapi_encrypt_with_secret(&body, b"0123456789abcdef").unwrap();
        let b = weapi_encrypt_with_secret(&body, b"0123456789abcdef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_weapi_random_secret_changes_output() {
        let body = json!({"s": "x"});
        let a = weapi_encrypt(&body).unwrap();
        let b = weapi_encrypt(&body).unwrap();
        assert_ne!(a.enc_sec_key, b.enc_sec_key);
    }

    #[test]
    fn test_weapi_rejects_bad_secret_length() {
        assert!(weapi_encrypt_with_secret(&json!({}), b"short").is_err());
    }
}
