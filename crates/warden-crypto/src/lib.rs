//! Cryptographic primitives for the warden platform.
//!
//! - [`codec`]: AES-256-GCM encryption of sensitive strings under the
//!   process-wide master key
//! - [`field`]: [`EncryptedField`], a value that is only ever stored sealed
//! - [`signing`]: HMAC-SHA256 signatures over webhook payloads

pub mod codec;
pub mod error;
pub mod field;
pub mod signing;

pub use codec::{decrypt, encrypt, MasterKey, SecretCodec};
pub use error::CryptoError;
pub use field::EncryptedField;
pub use signing::{generate_secret, generate_token, sign_payload, verify_signature};
