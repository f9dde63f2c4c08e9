use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    /// MS-CIFS 2.2.1.2.3 SMB_EXT_FILE_ATTR.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExtFileAttributes: u32 {
        const READONLY            = 0x0000_0001;
        const HIDDEN              = 0x0000_0002;
        const SYSTEM              = 0x0000_0004;
        const DIRECTORY           = 0x0000_0010;
        const ARCHIVE             = 0x0000_0020;
        const NORMAL              = 0x0000_0080;
        const TEMPORARY           = 0x0000_0100;
        const SPARSE_FILE         = 0x0000_0200;
        const REPARSE_POINT       = 0x0000_0400;
        const COMPRESSED          = 0x0000_0800;
        const OFFLINE             = 0x0000_1000;
        const NOT_CONTENT_INDEXED = 0x0000_2000;
        const ENCRYPTED           = 0x0000_4000;
        const POSIX_SEMANTICS     = 0x0100_0000;
        const BACKUP_SEMANTICS    = 0x0200_0000;
        const DELETE_ON_CLOSE     = 0x0400_0000;
        const SEQUENTIAL_SCAN     = 0x0800_0000;
        const RANDOM_ACCESS       = 0x1000_0000;
        const NO_BUFFERING        = 0x2000_0000;
        const WRITE_THROUGH       = 0x8000_0000;
    }
}

impl_smb_byte_size_for_bitflag! { ExtFileAttributes }
impl_smb_to_bytes_for_bitflag! { ExtFileAttributes }
impl_smb_from_bytes_for_bitflag! { ExtFileAttributes }
