use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize)]
pub enum ImpersonationLevel {
    Anonymous = 0x0,
    Identification = 0x1,
    #[default]
    Impersonation = 0x2,
    Delegate = 0x3,
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize)]
pub enum CreateDisposition {
    Supersede = 0x0,
    #[default]
    Open = 0x1,
    Create = 0x2,
    OpenIf = 0x3,
    Overwrite = 0x4,
    OverwriteIf = 0x5,
}
