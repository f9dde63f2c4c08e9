use des::cipher::BlockEncrypt;
use des::Des;
use digest::KeyInit;

use smb_core::error::SMBError;
use smb_core::SMBResult;

/// Encrypts an 8-byte block under a 16-byte key padded to 21 bytes and
/// split into three 7-byte DES keys, giving a 24-byte response.
pub fn des_long_encrypt(key: &[u8], plaintext: &[u8]) -> SMBResult<Vec<u8>> {
    if key.len() != 16 || plaintext.len() != 8 {
        return Err(SMBError::crypto_error("Invalid key length"));
    }
    let padded = [key, &[0_u8; 5][..]].concat();
    padded.chunks_exact(7)
        .map(|chunk| des_encrypt(chunk, plaintext))
        .collect::<SMBResult<Vec<_>>>()
        .map(|blocks| blocks.concat())
}

/// DES under a 7-byte key, expanded to 8 bytes with a zero parity bit.
pub fn des_encrypt(key: &[u8], plaintext: &[u8]) -> SMBResult<Vec<u8>> {
    if key.len() != 7 || plaintext.len() != 8 {
        return Err(SMBError::crypto_error("Invalid key length"));
    }
    let des = Des::new_from_slice(&extend_des_key(key))
        .map_err(|_| SMBError::crypto_error("Invalid key length"))?;
    let mut result = vec![0_u8; plaintext.len()];
    des.encrypt_block_b2b(plaintext.into(), (&mut *result).into());
    Ok(result)
}

fn extend_des_key(key: &[u8]) -> [u8; 8] {
    let mut result = [
        key[0] >> 1,
        ((key[0] & 0x01) << 6) | (key[1] >> 2),
        ((key[1] & 0x03) << 5) | (key[2] >> 3),
        ((key[2] & 0x07) << 4) | (key[3] >> 4),
        ((key[3] & 0x0F) << 3) | (key[4] >> 5),
        ((key[4] & 0x1F) << 2) | (key[5] >> 6),
        ((key[5] & 0x3F) << 1) | (key[6] >> 7),
        key[6] & 0x7F,
    ];
    for byte in result.iter_mut() {
        *byte <<= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_encrypt_yields_three_blocks() {
        let response = des_long_encrypt(&[0x11; 16], &[0x22; 8]).unwrap();
        assert_eq!(response.len(), 24);
        assert_eq!(&response[..8], &des_encrypt(&[0x11; 7], &[0x22; 8]).unwrap()[..]);
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert!(des_long_encrypt(&[0; 8], &[0; 8]).is_err());
        assert!(des_encrypt(&[0; 7], &[0; 4]).is_err());
    }

    #[test]
    fn key_expansion_spreads_seven_bits_per_byte() {
        assert_eq!(extend_des_key(&[0xFF; 7]), [0xFE; 8]);
        assert_eq!(extend_des_key(&[0; 7]), [0; 8]);
    }
}
