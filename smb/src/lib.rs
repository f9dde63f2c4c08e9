//! # SMB CIFS
//!
//! A Rust implementation of the client side of the **Common Internet File System
//! (CIFS) / SMB1 protocol** as specified in
//! [\[MS-CIFS\]](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cifs/d416ff7c-c536-406e-a951-4f04b2fd1d2b),
//! with the DFS referral handling from
//! [\[MS-DFSC\]](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dfsc/3109f4be-2dbb-42c9-9b8e-0b34f7a2135e).
//!
//! This crate provides:
//! - **Protocol layer** ([`protocol`]): the 32-byte SMB1 header, command bodies,
//!   the AndX chaining engine, the transaction fragmentation/reassembly engine
//!   and MAC signing.
//! - **DFS layer** ([`dfs`]): the domain, root and stand-alone referral caches
//!   and the resolution algorithm that walks them.
//! - **Socket layer** ([`socket`]): NetBIOS session framing over any blocking
//!   `Read`/`Write` pair.
//! - **Client layer** ([`client`]): a session that stamps identifiers, signs,
//!   sends, verifies and decodes messages.
//! - **Utilities** ([`util`]): NTLM hashing, DES expansion, signing key
//!   derivation and bitflag helpers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::net::TcpStream;
//! use smb_cifs::client::SMBClientSession;
//! use smb_cifs::config::SMBClientConfigBuilder;
//! use smb_cifs::socket::message_stream::SMBSocketConnection;
//! use smb_cifs::util::auth::User;
//!
//! fn main() -> smb_core::SMBResult<()> {
//!     let stream = TcpStream::connect("fileserver:445").map_err(smb_core::error::SMBError::io_error)?;
//!     let reader = stream.try_clone().map_err(smb_core::error::SMBError::io_error)?;
//!     let connection = SMBSocketConnection::new("fileserver".into(), reader, stream);
//!     let config = SMBClientConfigBuilder::default().build_config()?;
//!     let mut session = SMBClientSession::new(connection, config);
//!     session.negotiate()?;
//!     session.session_setup(&User::new("EXAMPLE", "user", "pass"), Some("\\\\fileserver\\IPC$"))?;
//!     Ok(())
//! }
//! ```

/// SMB1 wire-format protocol: header, bodies, AndX chaining, transactions, signing.
pub mod protocol;
/// DFS referral cache and resolver.
pub mod dfs;
/// Client configuration surface.
pub mod config;
/// Client session glue over a socket connection.
pub mod client;
/// Socket abstractions for SMB message transport.
pub mod socket;
/// Utility modules: credentials, cryptography, and flag macros.
pub mod util;
/// Fixed-width little-endian and time field encoders.
pub mod byte_helper;
