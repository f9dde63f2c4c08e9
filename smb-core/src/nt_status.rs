use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::{SMBByteSize, SMBFromBytes, SMBParseResult, SMBToBytes};

/// The 32-bit status carried in every SMB1 header when the client sets
/// `FLAGS2_ERROR_CODE_STATUS`. Values outside the table map to `UnknownError`.
#[repr(u32)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive, Copy)]
pub enum NTStatus {
    StatusSuccess = 0x0,
    NotifyEnumDir = 0x0000010C,
    BufferOverflow = 0x80000005,
    NoMoreFiles = 0x80000006,
    NotImplemented = 0xC0000002,
    InvalidHandle = 0xC0000008,
    InvalidParameter = 0xC000000D,
    NoSuchFile = 0xC000000F,
    MoreProcessingRequired = 0xC0000016,
    AccessDenied = 0xC0000022,
    BufferTooSmall = 0xC0000023,
    ObjectNameInvalid = 0xC0000033,
    ObjectNameNotFound = 0xC0000034,
    ObjectNameCollision = 0xC0000035,
    ObjectPathNotFound = 0xC000003A,
    SharingViolation = 0xC0000043,
    WrongPassword = 0xC000006A,
    LogonFailure = 0xC000006D,
    AccountRestriction = 0xC000006E,
    InvalidLogonHours = 0xC000006F,
    InvalidWorkstation = 0xC0000070,
    PasswordExpired = 0xC0000071,
    AccountDisabled = 0xC0000072,
    NoneMapped = 0xC0000073,
    PipeBusy = 0xC00000AE,
    PipeDisconnected = 0xC00000B0,
    PipeClosing = 0xC00000B1,
    FileIsADirectory = 0xC00000BA,
    StatusNotSupported = 0xC00000BB,
    DuplicateName = 0xC00000BD,
    NetworkNameDeleted = 0xC00000C9,
    NetworkAccessDenied = 0xC00000CA,
    BadNetworkName = 0xC00000CC,
    RequestNotAccepted = 0xC00000D0,
    NotADirectory = 0xC0000103,
    Cancelled = 0xC0000120,
    TrustedDomainFailure = 0xC000018C,
    AccountLockedOut = 0xC0000234,
    PathNotCovered = 0xC0000257,
    NotFound = 0xC0000225,
    UserSessionDeleted = 0xC0000203,
    NetworkSessionExpired = 0xC000035C,
    UnknownError = 0xFFFFFFFF,
}

impl NTStatus {
    pub fn from_u32(value: u32) -> Self {
        Self::try_from_primitive(value).unwrap_or(Self::UnknownError)
    }

    pub fn is_success(&self) -> bool {
        *self == Self::StatusSuccess
    }

    /// Statuses a server returns when the supplied credentials were rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self,
            Self::LogonFailure
            | Self::WrongPassword
            | Self::AccountRestriction
            | Self::InvalidLogonHours
            | Self::InvalidWorkstation
            | Self::PasswordExpired
            | Self::AccountDisabled
            | Self::AccountLockedOut
            | Self::TrustedDomainFailure
            | Self::AccessDenied
        )
    }
}

impl SMBByteSize for NTStatus {
    fn smb_byte_size(&self) -> usize {
        std::mem::size_of_val(&(*self as u32))
    }
}

impl SMBFromBytes for NTStatus {
    fn smb_from_bytes(input: &[u8]) -> SMBParseResult<&[u8], Self> where Self: Sized {
        let (remaining, underlying) = u32::smb_from_bytes(input)?;
        Ok((remaining, Self::from_u32(underlying)))
    }
}

impl SMBToBytes for NTStatus {
    fn smb_to_bytes(&self) -> Vec<u8> {
        (*self as u32).smb_to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MS-ERREF 2.3.1: STATUS_PATH_NOT_COVERED = 0xC0000257
    #[test]
    fn path_not_covered_value() {
        assert_eq!(NTStatus::PathNotCovered as u32, 0xC0000257);
    }

    #[test]
    fn unknown_values_do_not_fail_parsing() {
        let (remaining, status) = NTStatus::smb_from_bytes(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(status, NTStatus::UnknownError);
    }

    #[test]
    fn logon_failure_is_auth_failure() {
        assert!(NTStatus::LogonFailure.is_auth_failure());
        assert!(!NTStatus::ObjectNameNotFound.is_auth_failure());
        assert!(!NTStatus::StatusSuccess.is_auth_failure());
    }

    #[test]
    fn status_serializes_little_endian() {
        assert_eq!(NTStatus::BufferOverflow.smb_to_bytes(), vec![0x05, 0x00, 0x00, 0x80]);
    }
}
