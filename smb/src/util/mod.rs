/// Credentials consumed by key derivation.
pub mod auth;
/// NTLM hashing, DES expansion and SMB1 signing key derivation.
pub mod crypto;
pub(crate) mod flags_helper;
