//! A blocking SMB1 client session over one socket connection.

pub use session::SMBClientSession;

mod session;
