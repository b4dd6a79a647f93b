use crate::base::error::WatchError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use boring::symm::{Cipher, Crypter, Mode};

/// Characters the portal's login script draws random filler from.
const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTWXYZabcdefhijkmnprstwxyz2345678";

const FILLER_LEN: usize = 64;
const IV_LEN: usize = 16;

/// Encrypt a credential with the key scraped from the login page.
///
/// The scheme is fixed by the portal and must stay bit-compatible with its
/// login script: 64 random filler characters are prepended to the password,
/// the whole thing AES-CBC encrypted (PKCS7) under the trimmed key with a
/// random 16-character IV, and the raw ciphertext base64-encoded. The IV is
/// not transmitted; the server decrypts with an arbitrary IV and discards the
/// filler, which absorbs the garbled first block.
pub fn encrypt_credential(plaintext: &str, server_key: &str) -> Result<String, WatchError> {
    let key = server_key.trim().as_bytes();
    let cipher = match key.len() {
        16 => Cipher::aes_128_cbc(),
        24 => Cipher::aes_192_cbc(),
        32 => Cipher::aes_256_cbc(),
        _ => return Err(WatchError::Encoding("server key is not a valid aes key length")),
    };

    let mut data = random_chars(FILLER_LEN)?;
    data.extend_from_slice(plaintext.as_bytes());
    let iv = random_chars(IV_LEN)?;

    let mut crypter = Crypter::new(cipher, Mode::Encrypt, key, Some(&iv))
        .map_err(|_| WatchError::Encoding("cipher init failed"))?;
    crypter.pad(true);
    let mut ciphertext = vec![0u8; data.len() + cipher.block_size()];
    let mut written = crypter
        .update(&data, &mut ciphertext)
        .map_err(|_| WatchError::Encoding("cipher update failed"))?;
    written += crypter
        .finalize(&mut ciphertext[written..])
        .map_err(|_| WatchError::Encoding("cipher finalize failed"))?;
    ciphertext.truncate(written);

    Ok(BASE64.encode(ciphertext))
}

fn random_chars(len: usize) -> Result<Vec<u8>, WatchError> {
    let mut buf = vec![0u8; len];
    boring::rand::rand_bytes(&mut buf)
        .map_err(|_| WatchError::Encoding("random source unavailable"))?;
    for byte in &mut buf {
        *byte = CHARSET[usize::from(*byte) % CHARSET.len()];
    }
    Ok(buf)
}
