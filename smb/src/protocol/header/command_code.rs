use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use smb_core::{SMBByteSize, SMBFromBytes, SMBParseResult, SMBToBytes};
use smb_core::error::SMBError;

#[repr(u8)]
#[derive(Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize, Clone, Copy)]
pub enum SMBCommandCode {
    CreateDirectory = 0x00,
    DeleteDirectory = 0x01,
    Open = 0x02,
    Create = 0x03,
    Close = 0x04,
    Flush = 0x05,
    Delete = 0x06,
    Rename = 0x07,
    QueryInformation = 0x08,
    SetInformation = 0x09,
    Read = 0x0A,
    Write = 0x0B,
    LockByteRange = 0x0C,
    UnlockByteRange = 0x0D,
    CreateTemporary = 0x0E,
    CreateNew = 0x0F,
    CheckDirectory = 0x10,
    ProcessExit = 0x11,
    Seek = 0x12,
    LockAndRead = 0x13,
    WriteAndUnlock = 0x14,
    ReadRaw = 0x1A,
    ReadMpx = 0x1B,
    ReadMpxSecondary = 0x1C,
    WriteRaw = 0x1D,
    WriteMpx = 0x1E,
    WriteMpxSecondary = 0x1F,
    WriteComplete = 0x20,
    QueryServer = 0x21,
    SetInformation2 = 0x22,
    QueryInformation2 = 0x23,
    LockingAndX = 0x24,
    Transaction = 0x25,
    TransactionSecondary = 0x26,
    Ioctl = 0x27,
    IoctlSecondary = 0x28,
    Copy = 0x29,
    Move = 0x2A,
    Echo = 0x2B,
    WriteAndClose = 0x2C,
    OpenAndX = 0x2D,
    ReadAndX = 0x2E,
    WriteAndX = 0x2F,
    NewFileSize = 0x30,
    CloseAndTreeDisc = 0x31,
    Transaction2 = 0x32,
    Transaction2Secondary = 0x33,
    FindClose2 = 0x34,
    FindNotifyClose = 0x35,
    TreeConnect = 0x70,
    TreeDisconnect = 0x71,
    Negotiate = 0x72,
    SessionSetupAndX = 0x73,
    LogoffAndX = 0x74,
    TreeConnectAndX = 0x75,
    QueryInformationDisk = 0x80,
    Search = 0x81,
    Find = 0x82,
    FindUnique = 0x83,
    FindClose = 0x84,
    NtTransact = 0xA0,
    NtTransactSecondary = 0xA1,
    NtCreateAndX = 0xA2,
    NtCancel = 0xA4,
    NtRename = 0xA5,
    OpenPrintFile = 0xC0,
    WritePrintFile = 0xC1,
    ClosePrintFile = 0xC2,
    GetPrintQueue = 0xC3,
    ReadBulk = 0xD8,
    WriteBulk = 0xD9,
    WriteBulkData = 0xDA,
    Invalid = 0xFE,
    NoAndXCommand = 0xFF,
}

impl SMBCommandCode {
    /// Commands whose parameter block starts with the 4-byte AndX chain header.
    pub fn is_andx(&self) -> bool {
        matches!(self,
            Self::LockingAndX
            | Self::OpenAndX
            | Self::ReadAndX
            | Self::WriteAndX
            | Self::SessionSetupAndX
            | Self::LogoffAndX
            | Self::TreeConnectAndX
            | Self::NtCreateAndX
        )
    }

    /// Name used in `"<Predecessor>.<Successor>"` batch limit keys.
    pub fn batch_name(&self) -> &'static str {
        match self {
            Self::CheckDirectory => "CheckDirectory",
            Self::CreateDirectory => "CreateDirectory",
            Self::Delete => "Delete",
            Self::DeleteDirectory => "DeleteDirectory",
            Self::Rename => "Rename",
            Self::QueryInformation => "QueryInformation",
            Self::Close => "Close",
            Self::Transaction => "Transaction",
            Self::Transaction2 => "Transaction2",
            Self::NtTransact => "NtTransact",
            Self::OpenAndX => "OpenAndX",
            Self::ReadAndX => "ReadAndX",
            Self::WriteAndX => "WriteAndX",
            Self::LockingAndX => "LockingAndX",
            Self::SessionSetupAndX => "SessionSetupAndX",
            Self::LogoffAndX => "LogoffAndX",
            Self::TreeConnectAndX => "TreeConnectAndX",
            Self::NtCreateAndX => "NTCreateAndX",
            Self::Negotiate => "Negotiate",
            _ => "Other",
        }
    }
}

impl SMBByteSize for SMBCommandCode {
    fn smb_byte_size(&self) -> usize {
        1
    }
}

impl SMBFromBytes for SMBCommandCode {
    fn smb_from_bytes(input: &[u8]) -> SMBParseResult<&[u8], Self> {
        let (remaining, code) = u8::smb_from_bytes(input)?;
        let command = Self::try_from_primitive(code)
            .map_err(|_| SMBError::parse_error(format!("Unknown SMB command code 0x{:02X}", code)))?;
        Ok((remaining, command))
    }
}

impl SMBToBytes for SMBCommandCode {
    fn smb_to_bytes(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MS-CIFS 2.2.2.1: command codes carry their documented values.
    #[test]
    fn command_codes_match_wire_values() {
        assert_eq!(SMBCommandCode::Close as u8, 0x04);
        assert_eq!(SMBCommandCode::CheckDirectory as u8, 0x10);
        assert_eq!(SMBCommandCode::Transaction as u8, 0x25);
        assert_eq!(SMBCommandCode::ReadAndX as u8, 0x2E);
        assert_eq!(SMBCommandCode::Transaction2 as u8, 0x32);
        assert_eq!(SMBCommandCode::Negotiate as u8, 0x72);
        assert_eq!(SMBCommandCode::SessionSetupAndX as u8, 0x73);
        assert_eq!(SMBCommandCode::TreeConnectAndX as u8, 0x75);
        assert_eq!(SMBCommandCode::NtTransact as u8, 0xA0);
        assert_eq!(SMBCommandCode::NtCreateAndX as u8, 0xA2);
        assert_eq!(SMBCommandCode::NoAndXCommand as u8, 0xFF);
    }

    #[test]
    fn andx_commands_are_flagged() {
        assert!(SMBCommandCode::ReadAndX.is_andx());
        assert!(SMBCommandCode::NtCreateAndX.is_andx());
        assert!(!SMBCommandCode::Close.is_andx());
        assert!(!SMBCommandCode::Transaction.is_andx());
    }

    #[test]
    fn unknown_code_is_parse_error() {
        assert!(SMBCommandCode::smb_from_bytes(&[0x15]).is_err());
        let (_, code) = SMBCommandCode::smb_from_bytes(&[0x2F]).unwrap();
        assert_eq!(code, SMBCommandCode::WriteAndX);
    }
}
