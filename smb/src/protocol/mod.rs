//! SMB1/CIFS wire-format protocol definitions.
//!
//! This module contains the types needed to encode and decode SMB1 messages as
//! defined in [\[MS-CIFS\] Section 2](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cifs/d416ff7c-c536-406e-a951-4f04b2fd1d2b).
//!
//! - `header`: the 32-byte SMB header, command codes and flags.
//! - `wire`: header-relative write and read cursors.
//! - `body`: request/response parameter words and data bytes per command.
//! - `andx`: the AndX chaining engine.
//! - `message`: `SMBMessage`, a header plus its chain of bodies.
//! - `transaction`: fragmentation and reassembly for the transaction families.
//! - `signing`: MD5 message signing and verification.

pub mod andx;
pub mod body;
pub mod header;
pub mod message;
pub mod signing;
pub mod transaction;
pub mod wire;
