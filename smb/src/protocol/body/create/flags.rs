use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NTCreateFlags: u32 {
        const REQUEST_OPLOCK            = 0x02;
        const REQUEST_OPBATCH           = 0x04;
        const OPEN_TARGET_DIR           = 0x08;
        const REQUEST_EXTENDED_RESPONSE = 0x10;
    }
}

impl_smb_byte_size_for_bitflag! { NTCreateFlags }
impl_smb_to_bytes_for_bitflag! { NTCreateFlags }
impl_smb_from_bytes_for_bitflag! { NTCreateFlags }
