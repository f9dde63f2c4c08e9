mod header;
mod command_code;
mod flags;
mod flags2;

pub use header::{SIGNATURE_LENGTH, SIGNATURE_OFFSET, SMB_HEADER_LENGTH};
pub use command_code::SMBCommandCode;

pub type SMBHeader = header::SMBHeader;
pub type SMBFlags = flags::SMBFlags;
pub type SMBFlags2 = flags2::SMBFlags2;
