mod file_attributes;
mod flags;
mod impersonation_level;
mod nt_create;
mod options;
mod share_access;

pub type SMBNTCreateAndXRequest = nt_create::SMBNTCreateAndXRequest;
pub type SMBNTCreateAndXResponse = nt_create::SMBNTCreateAndXResponse;

pub type NTCreateFlags = flags::NTCreateFlags;
pub type ShareAccess = share_access::ShareAccess;
pub type ExtFileAttributes = file_attributes::ExtFileAttributes;
pub type CreateOptions = options::CreateOptions;
pub use impersonation_level::{CreateDisposition, ImpersonationLevel};
