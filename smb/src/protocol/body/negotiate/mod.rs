mod negotiate;
mod security_mode;

pub type SMBNegotiateRequest = negotiate::SMBNegotiateRequest;
pub type SMBNegotiateResponse = negotiate::SMBNegotiateResponse;

pub type SecurityMode = security_mode::SecurityMode;

pub use negotiate::NT_LM_DIALECT;
