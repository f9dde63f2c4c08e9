//! The AndX chaining engine.
//!
//! A chain is an ordered slice of bodies sharing one header. Each AndX link
//! carries a 4-byte block after its word count naming the next command and
//! the header-relative offset at which that command's word count sits.

use smb_core::error::SMBError;
use smb_core::logging::trace;
use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::body::{SMBBody, SMBCommand};
use crate::protocol::header::{SMBCommandCode, SMBHeader};
use crate::protocol::wire::{WireReader, WireWriter};

/// Offset written when a link has no successor. Never dereferenced.
pub const ANDX_NO_OFFSET: u16 = 0xDEDE;

const ANDX_BLOCK_LENGTH: usize = 4;
const NO_ANDX_COMMAND: u8 = SMBCommandCode::NoAndXCommand as u8;

/// Whether `predecessor`, sitting at depth `level` of a chain, may carry
/// `successor` in the same frame.
pub fn chain_permitted(config: &SMBClientConfig, predecessor: &dyn SMBCommand, successor: SMBCommandCode, level: usize) -> bool {
    config.use_batching
        && predecessor.is_andx()
        && level < predecessor.batch_limit(config, successor) as usize
}

/// Writes as much of `bodies` as may share one frame, starting at the word
/// count of the head. Returns the number of links written; the rest must be
/// sent on their own.
///
/// A response mirrors whatever chain its request carried, so `response`
/// lifts the batching limits.
pub fn encode_chain(writer: &mut WireWriter, config: &SMBClientConfig, bodies: &[SMBBody], response: bool) -> SMBResult<usize> {
    for (level, body) in bodies.iter().enumerate() {
        let command = body.as_command();
        let andx = command.is_andx();

        let word_count_position = writer.position();
        writer.write_u8(0)?;
        let andx_position = writer.position();
        if andx {
            writer.write_zeros(ANDX_BLOCK_LENGTH)?;
        }
        command.write_parameter_words(writer)?;
        if (writer.position() - andx_position) % 2 != 0 {
            writer.write_u8(0)?;
        }
        let word_count = ((writer.position() - andx_position) / 2) as u8;
        writer.patch_u8(word_count_position, command.reported_word_count(word_count))?;

        let byte_count_position = writer.position();
        writer.write_u16(0)?;
        let bytes_start = writer.position();
        command.write_bytes(writer)?;
        writer.patch_u16(byte_count_position, (writer.position() - bytes_start) as u16)?;

        if !andx {
            return Ok(level + 1);
        }
        match bodies.get(level + 1) {
            Some(next) if response || chain_permitted(config, command, next.command_code(), level) => {
                writer.patch_u8(andx_position, next.command_code() as u8)?;
                writer.patch_u16(andx_position + 2, writer.position() as u16)?;
            }
            suppressed => {
                if suppressed.is_some() {
                    trace!(
                        predecessor = ?command.command_code(),
                        successor = ?suppressed.map(SMBBody::command_code),
                        level,
                        "andx chaining suppressed"
                    );
                }
                writer.patch_u8(andx_position, NO_ANDX_COMMAND)?;
                writer.patch_u16(andx_position + 2, ANDX_NO_OFFSET)?;
                return Ok(level + 1);
            }
        }
    }
    Ok(bodies.len())
}

/// Reads a chain into the caller-supplied `bodies`, starting at the word
/// count of the head. Returns the number of links the frame carried.
///
/// Every successor the server names must have a body waiting for it with
/// the same command code; anything else is a protocol error.
pub fn decode_chain(reader: &mut WireReader, header: &SMBHeader, bodies: &mut [SMBBody]) -> SMBResult<usize> {
    let mut level = 0;
    loop {
        let Some(body) = bodies.get_mut(level) else {
            return Err(SMBError::protocol_error("no andx command supplied with response"));
        };
        let command = body.as_command_mut();
        let andx = command.is_andx();

        let start = reader.position();
        let raw_word_count = reader.read_u8()?;
        let (mut next_command, mut next_offset) = (NO_ANDX_COMMAND, 0);
        if andx && raw_word_count != 0 {
            next_command = reader.read_u8()?;
            reader.skip(1);
            next_offset = reader.read_u16()?;
            if next_offset == 0 {
                // some servers leave the command set but zero the offset
                next_command = NO_ANDX_COMMAND;
            }
        }
        let word_count = raw_word_count.saturating_add(command.word_count_adjustment(raw_word_count));
        let has_words = if andx { word_count > 2 } else { word_count != 0 };
        if has_words {
            command.read_parameter_words(reader, word_count)?;
        }

        reader.seek(start + 1 + word_count as usize * 2);
        let byte_count = reader.read_u16()? as usize;
        let bytes_start = reader.position();
        if raw_word_count != 0 || byte_count != 0 {
            command.read_bytes(reader, byte_count)?;
        }
        reader.seek(bytes_start + byte_count);

        if !andx || header.status != 0 || next_command == NO_ANDX_COMMAND {
            return Ok(level + 1);
        }
        level += 1;
        match bodies.get(level) {
            None => return Err(SMBError::protocol_error("no andx command supplied with response")),
            Some(next) if next.command_code() as u8 != next_command => {
                return Err(SMBError::protocol_error(format!(
                    "andx command 0x{:02X} does not match expected {:?}",
                    next_command,
                    next.command_code()
                )));
            }
            Some(_) => reader.seek(next_offset as usize),
        }
    }
}
