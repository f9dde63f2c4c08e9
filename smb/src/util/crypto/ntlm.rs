//! NTLM and NTLMv2 one-way functions and challenge responses, MS-NLMP 3.3.

use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::wire::{encode_oem, encode_unicode};
use crate::util::auth::User;
use crate::util::crypto::des::{des_encrypt, des_long_encrypt};

const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

/// NTOWFv1: MD4 of the UTF-16LE password.
pub fn nt_hash(password: &str) -> Vec<u8> {
    Md4::digest(encode_unicode(password)).to_vec()
}

/// LMOWFv1: the upper-cased OEM password, cut or padded to 14 bytes, as two DES keys.
pub fn lm_hash(password: &str) -> SMBResult<Vec<u8>> {
    let mut key = encode_oem(&password.to_uppercase());
    key.resize(14, 0);
    Ok([des_encrypt(&key[..7], LM_MAGIC)?, des_encrypt(&key[7..], LM_MAGIC)?].concat())
}

pub fn ntlm_response(password: &str, challenge: &[u8]) -> SMBResult<Vec<u8>> {
    des_long_encrypt(&nt_hash(password), challenge)
}

pub fn lm_response(password: &str, challenge: &[u8]) -> SMBResult<Vec<u8>> {
    des_long_encrypt(&lm_hash(password)?, challenge)
}

/// The NTLM user session key: MD4 of the NT hash.
pub fn ntlm_session_key(password: &str) -> Vec<u8> {
    Md4::digest(nt_hash(password)).to_vec()
}

/// NTOWFv2: HMAC-MD5 keyed by the NT hash over `UPPER(user) ‖ domain`.
pub fn ntowf_v2(user: &User) -> SMBResult<Vec<u8>> {
    let text = user.username.to_uppercase() + &user.domain;
    Ok(new_hmac_from_slice(&nt_hash(&user.password))?
        .chain_update(encode_unicode(&text))
        .finalize()
        .into_bytes()
        .to_vec())
}

/// LMv2: the 16-byte proof over both challenges, followed by the client challenge.
pub fn lmv2_response(user: &User, challenge: &[u8], client_challenge: &[u8]) -> SMBResult<Vec<u8>> {
    let proof = lmv2_proof(user, challenge, client_challenge)?;
    Ok([proof.as_slice(), client_challenge].concat())
}

/// HMAC-MD5 keyed by NTOWFv2 over the LMv2 proof.
pub fn ntlmv2_session_key(user: &User, challenge: &[u8], client_challenge: &[u8]) -> SMBResult<Vec<u8>> {
    let proof = lmv2_proof(user, challenge, client_challenge)?;
    Ok(new_hmac_from_slice(&ntowf_v2(user)?)?
        .chain_update(proof)
        .finalize()
        .into_bytes()
        .to_vec())
}

fn lmv2_proof(user: &User, challenge: &[u8], client_challenge: &[u8]) -> SMBResult<Vec<u8>> {
    Ok(new_hmac_from_slice(&ntowf_v2(user)?)?
        .chain_update(challenge)
        .chain_update(client_challenge)
        .finalize()
        .into_bytes()
        .to_vec())
}

fn new_hmac_from_slice(slice: &[u8]) -> SMBResult<Hmac<Md5>> {
    <Hmac<Md5>>::new_from_slice(slice).map_err(|_| SMBError::crypto_error("Invalid length for key"))
}
