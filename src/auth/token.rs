//! Session token codec.
//!
//! A token is the user id followed by the session id (16 raw bytes each),
//! base64url encoded without padding: always 43 characters. Decoding only
//! checks the shape. A token is trusted once it matches the stored session
//! byte for byte.

use base64ct::{Base64UrlUnpadded, Encoding};
use thiserror::Error;
use uuid::Uuid;

const RAW_LEN: usize = 32;

/// Encoded length of every token.
pub const TOKEN_LEN: usize = 43;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed session token")]
    Malformed,
}

#[must_use]
pub fn create_token(user_id: Uuid, session_id: Uuid) -> String {
    let mut raw = [0u8; RAW_LEN];
    raw[..16].copy_from_slice(user_id.as_bytes());
    raw[16..].copy_from_slice(session_id.as_bytes());
    Base64UrlUnpadded::encode_string(&raw)
}

/// Split a token into `(user_id, session_id)`.
///
/// # Errors
/// Returns [`TokenError::Malformed`] unless the token decodes into exactly two ids.
pub fn decode_token(token: &str) -> Result<(Uuid, Uuid), TokenError> {
    if token.len() != TOKEN_LEN {
        return Err(TokenError::Malformed);
    }
    let mut raw = [0u8; RAW_LEN];
    let decoded =
        Base64UrlUnpadded::decode(token, &mut raw).map_err(|_| TokenError::Malformed)?;
    if decoded.len() != RAW_LEN {
        return Err(TokenError::Malformed);
    }
    let user_id = Uuid::from_slice(&decoded[..16]).map_err(|_| TokenError::Malformed)?;
    let session_id = Uuid::from_slice(&decoded[16..]).map_err(|_| TokenError::Malformed)?;
    Ok((user_id, session_id))
}

/// # Errors
/// Returns [`TokenError::Malformed`] when the token cannot be decoded.
pub fn extract_session_id(token: &str) -> Result<Uuid, TokenError> {
    decode_token(token).map(|(_, session_id)| session_id)
}
