use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
    pub struct Capabilities: u32 {
        const RAW_MODE           = 0x0000_0001;
        const MPX_MODE           = 0x0000_0002;
        const UNICODE            = 0x0000_0004;
        const LARGE_FILES        = 0x0000_0008;
        const NT_SMBS            = 0x0000_0010;
        const RPC_REMOTE_APIS    = 0x0000_0020;
        const STATUS32           = 0x0000_0040;
        const LEVEL_II_OPLOCKS   = 0x0000_0080;
        const LOCK_AND_READ      = 0x0000_0100;
        const NT_FIND            = 0x0000_0200;
        const DFS                = 0x0000_1000;
        const INFOLEVEL_PASSTHRU = 0x0000_2000;
        const LARGE_READX        = 0x0000_4000;
        const LARGE_WRITEX       = 0x0000_8000;
        const LWIO               = 0x0001_0000;
        const UNIX               = 0x0080_0000;
        const DYNAMIC_REAUTH     = 0x2000_0000;
        const EXTENDED_SECURITY  = 0x8000_0000;
    }
}

impl_smb_byte_size_for_bitflag! { Capabilities }
impl_smb_from_bytes_for_bitflag! { Capabilities }
impl_smb_to_bytes_for_bitflag! { Capabilities }
