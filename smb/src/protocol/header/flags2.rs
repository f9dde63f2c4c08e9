use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
    pub struct SMBFlags2: u16 {
        const UNICODE_STRINGS             = 0b1000000000000000;
        const ERROR_CODE_STATUS           = 0b100000000000000; // 32_BIT_STATUS
        const READ_IF_EXECUTE             = 0b10000000000000;
        const DFS_PATHNAME                = 0b1000000000000;
        const EXTENDED_SECURITY           = 0b100000000000;
        const REPARSE_PATH                = 0b10000000000;
        const IS_LONG_NAME                = 0b1000000;
        const SECURITY_SIGNATURE_REQUIRED = 0b10000;
        const COMPRESSED                  = 0b1000;
        const SECURITY_SIGNATURE          = 0b100;
        const EAS                         = 0b10;
        const KNOWS_LONG_NAMES            = 0b1;
    }
}

impl Default for SMBFlags2 {
    fn default() -> Self {
        SMBFlags2::KNOWS_LONG_NAMES | SMBFlags2::ERROR_CODE_STATUS
    }
}

impl_smb_byte_size_for_bitflag! { SMBFlags2 }
impl_smb_from_bytes_for_bitflag! { SMBFlags2 }
impl_smb_to_bytes_for_bitflag! { SMBFlags2 }

#[cfg(test)]
mod tests {
    use super::*;
    use smb_core::SMBToBytes;

    /// MS-CIFS 2.2.3.1: SMB_FLAGS2_UNICODE = 0x8000, SMB_FLAGS2_NT_STATUS = 0x4000
    #[test]
    fn unicode_and_status_values() {
        assert_eq!(SMBFlags2::UNICODE_STRINGS.bits(), 0x8000);
        assert_eq!(SMBFlags2::ERROR_CODE_STATUS.bits(), 0x4000);
        assert_eq!(SMBFlags2::DFS_PATHNAME.bits(), 0x1000);
    }

    #[test]
    fn flags2_serialize_little_endian() {
        let flags = SMBFlags2::UNICODE_STRINGS | SMBFlags2::SECURITY_SIGNATURE;
        assert_eq!(flags.smb_to_bytes(), vec![0x04, 0x80]);
    }
}
