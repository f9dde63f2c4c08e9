pub mod des;
pub mod ntlm;
pub mod smb1;

pub use smb1::{generate_signing_key, PasswordAuthentication};
