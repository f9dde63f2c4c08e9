//! NT_TRANSACT_NOTIFY_CHANGE, MS-CIFS 2.2.7.4.

use bitflags::bitflags;
use nom::number::complete::le_u32;
use nom::sequence::tuple;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::wire::encode_unicode;
use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

pub const NT_TRANSACT_NOTIFY_CHANGE: u16 = 0x04;
pub const DEFAULT_MAX_PARAMETER_COUNT: u32 = 4096;

const RECORD_HEAD_LENGTH: usize = 12;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct CompletionFilter: u32 {
        const FILE_NAME = 0x001;
        const DIR_NAME = 0x002;
        const ATTRIBUTES = 0x004;
        const SIZE = 0x008;
        const LAST_WRITE = 0x010;
        const LAST_ACCESS = 0x020;
        const CREATION = 0x040;
        const EA = 0x080;
        const SECURITY = 0x100;
        const STREAM_NAME = 0x200;
        const STREAM_SIZE = 0x400;
        const STREAM_WRITE = 0x800;
    }
}

impl_smb_byte_size_for_bitflag!(CompletionFilter);
impl_smb_to_bytes_for_bitflag!(CompletionFilter);
impl_smb_from_bytes_for_bitflag!(CompletionFilter);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotifyChangeRequest {
    pub fid: u16,
    pub completion_filter: CompletionFilter,
    pub watch_tree: bool,
    pub max_parameter_count: u32,
}

impl NotifyChangeRequest {
    pub fn new(fid: u16, completion_filter: CompletionFilter, watch_tree: bool) -> Self {
        Self {
            fid,
            completion_filter,
            watch_tree,
            max_parameter_count: DEFAULT_MAX_PARAMETER_COUNT,
        }
    }

    pub(crate) fn setup(&self) -> Vec<u16> {
        let filter = self.completion_filter.bits();
        vec![filter as u16, (filter >> 16) as u16, self.fid, self.watch_tree as u16]
    }

    /// Reads a request back out of its setup words.
    pub fn from_setup(setup: &[u16]) -> SMBResult<Self> {
        let [low, high, fid, watch_tree] = setup else {
            return Err(SMBError::parse_error(format!("notify change needs 4 setup words, got {}", setup.len())));
        };
        Ok(Self::new(
            *fid,
            CompletionFilter::from_bits_retain(*low as u32 | (*high as u32) << 16),
            *watch_tree & 0xFF != 0,
        ))
    }
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize)]
pub enum FileAction {
    Added = 0x1,
    Removed = 0x2,
    Modified = 0x3,
    RenamedOldName = 0x4,
    RenamedNewName = 0x5,
}

/// One `FILE_NOTIFY_INFORMATION` record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileNotifyInformation {
    pub action: FileAction,
    pub file_name: String,
}

impl FileNotifyInformation {
    pub fn new(action: FileAction, file_name: &str) -> Self {
        Self {
            action,
            file_name: file_name.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct NotifyChangeResponse {
    pub changes: Vec<FileNotifyInformation>,
}

impl NotifyChangeResponse {
    /// An empty parameter block means the server's buffer overflowed and the
    /// caller should rescan; it parses to no changes.
    pub fn parse(&mut self, parameters: &[u8]) -> SMBResult<()> {
        self.changes.clear();
        let mut position = 0;
        while position < parameters.len() {
            let (name_bytes, (next, action, name_length)) = tuple((le_u32, le_u32, le_u32))(&parameters[position..])
                .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| SMBError::parse_error("Truncated FILE_NOTIFY_INFORMATION"))?;
            let name_length = name_length as usize;
            if name_bytes.len() < name_length {
                return Err(SMBError::payload_too_small(position + RECORD_HEAD_LENGTH + name_length, parameters.len()));
            }
            let units: Vec<u16> = name_bytes[..name_length]
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let action = FileAction::try_from(action)
                .map_err(|_| SMBError::parse_error(format!("Unknown notify action {}", action)))?;
            self.changes.push(FileNotifyInformation {
                action,
                file_name: String::from_utf16(&units).map_err(SMBError::parse_error)?,
            });
            if next == 0 {
                break;
            }
            if next % 4 != 0 {
                return Err(SMBError::protocol_error(format!("notify record offset {} is not 4-byte aligned", next)));
            }
            position += next as usize;
        }
        Ok(())
    }

    pub fn encode(&self) -> SMBResult<Vec<u8>> {
        let mut out = Vec::new();
        for (index, change) in self.changes.iter().enumerate() {
            let name = encode_unicode(&change.file_name);
            let unpadded = RECORD_HEAD_LENGTH + name.len();
            let record_length = unpadded.next_multiple_of(4);
            let next = if index + 1 == self.changes.len() { 0 } else { record_length as u32 };
            out.extend(next.to_le_bytes());
            out.extend(u32::from(change.action).to_le_bytes());
            out.extend((name.len() as u32).to_le_bytes());
            out.extend(name);
            if next != 0 {
                out.resize(out.len() + record_length - unpadded, 0);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_packs_filter_fid_and_tree() {
        let request = NotifyChangeRequest::new(0x4002, CompletionFilter::FILE_NAME | CompletionFilter::STREAM_WRITE, true);
        let setup = request.setup();
        assert_eq!(setup, vec![0x0801, 0x0000, 0x4002, 1]);
        assert_eq!(NotifyChangeRequest::from_setup(&setup).unwrap(), request);
    }

    #[test]
    fn records_follow_next_entry_offsets() {
        let response = NotifyChangeResponse {
            changes: vec![
                FileNotifyInformation::new(FileAction::RenamedOldName, "a.txt"),
                FileNotifyInformation::new(FileAction::RenamedNewName, "bb.txt"),
                FileNotifyInformation::new(FileAction::Removed, "c"),
            ],
        };
        let bytes = response.encode().unwrap();
        // 12 + 10 rounds up to 24
        assert_eq!(&bytes[0..4], &[24, 0, 0, 0]);
        let mut parsed = NotifyChangeResponse::default();
        parsed.parse(&bytes).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn misaligned_offset_is_protocol_error() {
        let mut bytes = vec![];
        bytes.extend(14_u32.to_le_bytes());
        bytes.extend(1_u32.to_le_bytes());
        bytes.extend(2_u32.to_le_bytes());
        bytes.extend([b'x', 0]);
        bytes.extend([0; 16]);
        let mut parsed = NotifyChangeResponse::default();
        assert!(matches!(parsed.parse(&bytes), Err(SMBError::ProtocolError(_))));
    }

    #[test]
    fn empty_parameters_mean_no_changes() {
        let mut parsed = NotifyChangeResponse {
            changes: vec![FileNotifyInformation::new(FileAction::Added, "stale")],
        };
        parsed.parse(&[]).unwrap();
        assert!(parsed.changes.is_empty());
    }
}
