/// Flick Crypto Library
///
/// Server-side authenticated encryption for message content at rest.
/// A single AES-256-GCM key, loaded once at startup, protects every message.
/// Stored blobs are laid out as `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

pub mod cipher;
pub mod keys;

pub use cipher::{MessageCipher, NONCE_LEN, TAG_LEN};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption key is not valid base64: {0}")]
    KeyEncoding(#[from] base64::DecodeError),

    #[error("encryption failed")]
    Encryption,

    /// Authentication tag mismatch or a blob too short to hold a nonce.
    #[error("ciphertext failed integrity check")]
    Integrity,
}
