//! Password responses and the MAC signing key for SMB1 sessions, selected by
//! the configured LM compatibility level.

use rand::RngCore;

use smb_core::SMBResult;

use crate::util::auth::User;
use crate::util::crypto::ntlm;

/// The responses a password session setup carries and the key that signs
/// the rest of the session, for one server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordAuthentication {
    pub user: User,
    pub level: u8,
    pub challenge: Vec<u8>,
    pub client_challenge: [u8; 8],
}

impl PasswordAuthentication {
    /// Draws a fresh client challenge.
    pub fn new(user: User, level: u8, challenge: &[u8]) -> Self {
        let mut client_challenge = [0; 8];
        rand::thread_rng().fill_bytes(&mut client_challenge);
        Self::with_client_challenge(user, level, challenge, client_challenge)
    }

    pub fn with_client_challenge(user: User, level: u8, challenge: &[u8], client_challenge: [u8; 8]) -> Self {
        Self {
            user,
            level,
            challenge: challenge.to_vec(),
            client_challenge,
        }
    }

    fn uses_v2(&self) -> bool {
        (3..=5).contains(&self.level)
    }

    /// The case-insensitive (LM-style) password field.
    pub fn ansi_hash(&self) -> SMBResult<Vec<u8>> {
        let password = &self.user.password;
        match self.level {
            0 | 1 => ntlm::lm_response(password, &self.challenge),
            3..=5 => ntlm::lmv2_response(&self.user, &self.challenge, &self.client_challenge),
            _ => ntlm::ntlm_response(password, &self.challenge),
        }
    }

    /// The case-sensitive (NT-style) password field. Empty under NTLMv2.
    pub fn unicode_hash(&self) -> SMBResult<Vec<u8>> {
        if self.uses_v2() {
            return Ok(Vec::new());
        }
        ntlm::ntlm_response(&self.user.password, &self.challenge)
    }

    pub fn user_session_key(&self) -> SMBResult<Vec<u8>> {
        if self.uses_v2() {
            ntlm::ntlmv2_session_key(&self.user, &self.challenge, &self.client_challenge)
        } else {
            Ok(ntlm::ntlm_session_key(&self.user.password))
        }
    }
}

/// The MAC key: at levels 3 to 5 the 16-byte NTLMv2 session key, otherwise
/// the 16-byte NTLM session key followed by the 24-byte NTLM response.
pub fn generate_signing_key(authentication: &PasswordAuthentication) -> SMBResult<Vec<u8>> {
    let mut key = authentication.user_session_key()?;
    if !authentication.uses_v2() {
        key.extend(authentication.unicode_hash()?);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authentication(level: u8) -> PasswordAuthentication {
        PasswordAuthentication::with_client_challenge(User::new("Domain", "User", "Password"), level, &[1, 2, 3, 4, 5, 6, 7, 8], [0xAA; 8])
    }

    #[test]
    fn key_length_follows_level() {
        for level in [0, 1, 2, 6] {
            assert_eq!(generate_signing_key(&authentication(level)).unwrap().len(), 40, "level {}", level);
        }
        for level in [3, 4, 5] {
            assert_eq!(generate_signing_key(&authentication(level)).unwrap().len(), 16, "level {}", level);
        }
    }

    #[test]
    fn legacy_key_is_session_key_then_response() {
        let auth = authentication(2);
        let key = generate_signing_key(&auth).unwrap();
        assert_eq!(&key[..16], &ntlm::ntlm_session_key("Password")[..]);
        assert_eq!(&key[16..], &auth.unicode_hash().unwrap()[..]);
    }

    #[test]
    fn v2_levels_send_no_unicode_hash() {
        let auth = authentication(3);
        assert!(auth.unicode_hash().unwrap().is_empty());
        assert_eq!(auth.ansi_hash().unwrap().len(), 24);
        assert_eq!(&auth.ansi_hash().unwrap()[16..], &[0xAA; 8]);
    }

    #[test]
    fn fresh_client_challenges_differ() {
        let user = User::new("Domain", "User", "Password");
        let first = PasswordAuthentication::new(user.clone(), 3, &[0; 8]);
        let second = PasswordAuthentication::new(user, 3, &[0; 8]);
        assert_ne!(first.client_challenge, second.client_challenge);
    }
}
