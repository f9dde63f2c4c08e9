use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
    pub struct SMBFlags: u8 {
        const SERVER_TO_REDIR      = 0b10000000;
        const REQUEST_BATCH_OPLOCK = 0b1000000;
        const REQUEST_OPLOCK       = 0b100000;
        const CANONICAL_PATHNAMES  = 0b10000;
        const CASELESS_PATHNAMES   = 0b1000;
        const RESERVED             = 0b100;
        const CLIENT_BUF_AVAIL     = 0b10;
        const SUPPORT_LOCKREAD     = 0b1;
    }
}

impl Default for SMBFlags {
    fn default() -> Self {
        SMBFlags::CANONICAL_PATHNAMES | SMBFlags::CASELESS_PATHNAMES
    }
}

impl_smb_byte_size_for_bitflag! { SMBFlags }
impl_smb_from_bytes_for_bitflag! { SMBFlags }
impl_smb_to_bytes_for_bitflag! { SMBFlags }
