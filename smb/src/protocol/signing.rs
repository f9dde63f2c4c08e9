//! SMB1 message signing, MS-CIFS 3.1.4.1.
//!
//! The MAC is the first 8 bytes of `MD5(key ‖ message)`, computed with the
//! signature field holding the sequence number. Each signed request takes
//! two sequence numbers: one for itself and one for its response.

use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use digest::Digest;
use md5::Md5;

use smb_core::error::SMBError;
use smb_core::logging::{trace, warn};
use smb_core::SMBResult;

use crate::protocol::body::SMBBody;
use crate::protocol::header::{SIGNATURE_LENGTH, SIGNATURE_OFFSET, SMB_HEADER_LENGTH};
use crate::protocol::message::{SMBMessage, Verification};
use crate::util::crypto::{generate_signing_key, PasswordAuthentication};

/// Written instead of a MAC while the bypass is armed.
pub const BYPASS_SIGNATURE: [u8; SIGNATURE_LENGTH] = *b"BSRSPYL ";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    #[default]
    Disabled,
    /// The next signed message carries [`BYPASS_SIGNATURE`].
    Armed,
    Consumed,
}

pub struct SigningDigest<D: Digest = Md5> {
    key: Vec<u8>,
    sequence: u32,
    bypass: Bypass,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest> Debug for SigningDigest<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningDigest")
            .field("key_length", &self.key.len())
            .field("sequence", &self.sequence)
            .field("bypass", &self.bypass)
            .finish()
    }
}

impl<D: Digest> SigningDigest<D> {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key,
            sequence: 0,
            bypass: Bypass::Disabled,
            _digest: PhantomData,
        }
    }

    pub fn from_authentication(authentication: &PasswordAuthentication) -> SMBResult<Self> {
        Ok(Self::new(generate_signing_key(authentication)?))
    }

    /// Starts counting from `sequence`, as a server answering request `sequence - 1` would.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn arm_bypass(&mut self) {
        self.bypass = Bypass::Armed;
    }

    pub fn bypass(&self) -> Bypass {
        self.bypass
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Signs `data[offset..offset + length]` in place and assigns sequence
    /// numbers to the request and, when given, its response.
    pub fn sign(
        &mut self,
        data: &mut [u8],
        offset: usize,
        length: usize,
        request: &mut SMBMessage,
        response: Option<&mut SMBMessage>,
    ) -> SMBResult<()> {
        let end = offset.checked_add(length).filter(|end| *end <= data.len());
        let Some(end) = end.filter(|_| length >= SMB_HEADER_LENGTH) else {
            return Err(SMBError::precondition_failed(format!(
                "cannot sign {} bytes at {} in a {} byte buffer",
                length,
                offset,
                data.len()
            )));
        };
        let field = offset + SIGNATURE_OFFSET;
        data[field..field + 4].copy_from_slice(&self.sequence.to_le_bytes());
        data[field + 4..field + SIGNATURE_LENGTH].fill(0);

        let signature = if self.bypass == Bypass::Armed {
            self.bypass = Bypass::Consumed;
            BYPASS_SIGNATURE.to_vec()
        } else {
            D::new()
                .chain_update(&self.key)
                .chain_update(&data[offset..end])
                .finalize()
                .to_vec()
        };
        data[field..field + SIGNATURE_LENGTH].copy_from_slice(&signature[..SIGNATURE_LENGTH]);

        request.sign_seq = self.sequence;
        if let Some(response) = response {
            response.sign_seq = self.sequence.wrapping_add(1);
        }
        trace!(sequence = self.sequence, length, "signed message");
        self.sequence = self.sequence.wrapping_add(2);
        Ok(())
    }

    /// Checks a received message against the sequence number its request
    /// assigned. The outcome is recorded on `response` and returned.
    ///
    /// A ReadAndX payload delivered outside `data` is hashed after the part
    /// of the message that precedes it.
    pub fn verify(&self, data: &[u8], offset: usize, response: &mut SMBMessage) -> bool {
        let passed = self.compute_verification(data, offset, response).unwrap_or(false);
        response.verification = if passed { Verification::Passed } else { Verification::Failed };
        if !passed {
            warn!(sequence = response.sign_seq, mid = response.header.mid, "signature verification failed");
        }
        passed
    }

    fn compute_verification(&self, data: &[u8], offset: usize, response: &SMBMessage) -> Option<bool> {
        let field = offset + SIGNATURE_OFFSET;
        let payload: &[u8] = match response.head() {
            Some(SMBBody::ReadAndXResponse(read)) if read.detached => read.data.as_slice(),
            _ => &[],
        };
        let region_end = (offset + response.length).checked_sub(payload.len())?;
        let received = data.get(field..field + SIGNATURE_LENGTH)?;

        let mut sequence = [0_u8; SIGNATURE_LENGTH];
        sequence[..4].copy_from_slice(&response.sign_seq.to_le_bytes());
        let computed = D::new()
            .chain_update(&self.key)
            .chain_update(data.get(offset..field)?)
            .chain_update(sequence)
            .chain_update(data.get(field + SIGNATURE_LENGTH..region_end)?)
            .chain_update(payload)
            .finalize();
        Some(computed.get(..SIGNATURE_LENGTH)? == received)
    }
}
