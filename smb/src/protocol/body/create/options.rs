use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CreateOptions: u32 {
        const DIRECTORY_FILE            = 0x0000_0001;
        const WRITE_THROUGH             = 0x0000_0002;
        const SEQUENTIAL_ONLY           = 0x0000_0004;
        const NO_INTERMEDIATE_BUFFERING = 0x0000_0008;
        const SYNCHRONOUS_IO_ALERT      = 0x0000_0010;
        const SYNCHRONOUS_IO_NONALERT   = 0x0000_0020;
        const NON_DIRECTORY_FILE        = 0x0000_0040;
        const CREATE_TREE_CONNECTION    = 0x0000_0080;
        const COMPLETE_IF_OPLOCKED      = 0x0000_0100;
        const NO_EA_KNOWLEDGE           = 0x0000_0200;
        const OPEN_FOR_RECOVERY         = 0x0000_0400;
        const RANDOM_ACCESS             = 0x0000_0800;
        const DELETE_ON_CLOSE           = 0x0000_1000;
        const OPEN_BY_FILE_ID           = 0x0000_2000;
        const OPEN_FOR_BACKUP_INTENT    = 0x0000_4000;
        const NO_COMPRESSION            = 0x0000_8000;
        const RESERVE_OPFILTER          = 0x0010_0000;
        const OPEN_NO_RECALL            = 0x0040_0000;
        const OPEN_FOR_FREE_SPACE_QUERY = 0x0080_0000;
    }
}

impl_smb_byte_size_for_bitflag! { CreateOptions }
impl_smb_to_bytes_for_bitflag! { CreateOptions }
impl_smb_from_bytes_for_bitflag! { CreateOptions }
