use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_from_bytes_for_bitflag, impl_smb_to_bytes_for_bitflag};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
    pub struct SecurityMode: u8 {
        const USER_SECURITY       = 0x01;
        const ENCRYPT_PASSWORDS   = 0x02;
        const SIGNATURES_ENABLED  = 0x04;
        const SIGNATURES_REQUIRED = 0x08;
    }
}

impl_smb_byte_size_for_bitflag! { SecurityMode }
impl_smb_from_bytes_for_bitflag! { SecurityMode }
impl_smb_to_bytes_for_bitflag! { SecurityMode }
