use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::body::{declared_batch_limit, SMBCommand};
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{align_up, WireReader, WireWriter};

/// Header, word count, 12 parameter words and the byte count: everything of
/// a ReadAndX response that precedes its pad and payload.
pub const READ_ANDX_RESPONSE_HEAD_LENGTH: usize = 59;
pub const READ_ANDX_RESPONSE_WORD_COUNT: u8 = 12;
/// Offsets of DataLength, DataOffset and DataLengthHigh from the header start.
pub const READ_ANDX_DATA_LENGTH_OFFSET: usize = 43;
pub const READ_ANDX_DATA_OFFSET_OFFSET: usize = 45;
pub const READ_ANDX_DATA_LENGTH_HIGH_OFFSET: usize = 47;

/// MS-CIFS 2.2.4.42.1 with the MS-SMB large read extension: the high half
/// of `max_count` travels in the timeout field.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBReadAndXRequest {
    pub fid: u16,
    pub offset: u64,
    pub max_count: u32,
    pub min_count: u16,
    pub remaining: u16,
}

impl SMBReadAndXRequest {
    pub fn new(fid: u16, offset: u64, max_count: u32) -> Self {
        Self {
            fid,
            offset,
            max_count,
            min_count: max_count.min(u16::MAX as u32) as u16,
            remaining: 0,
        }
    }
}

impl SMBCommand for SMBReadAndXRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::ReadAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.fid)?;
        writer.write_u32(self.offset as u32)?;
        writer.write_u16(self.max_count as u16)?;
        writer.write_u16(self.min_count)?;
        writer.write_u32(self.max_count >> 16)?;
        writer.write_u16(self.remaining)?;
        writer.write_u32((self.offset >> 32) as u32)
    }

    fn write_bytes(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.fid = reader.read_u16()?;
        let offset_low = reader.read_u32()?;
        let max_count_low = reader.read_u16()?;
        self.min_count = reader.read_u16()?;
        let max_count_high = reader.read_u32()?;
        self.remaining = reader.read_u16()?;
        let offset_high = if word_count >= 12 { reader.read_u32()? } else { 0 };
        self.offset = ((offset_high as u64) << 32) | offset_low as u64;
        // a real timeout (0xFFFFFFFF) is not a count
        let max_count_high = if max_count_high == u32::MAX { 0 } else { max_count_high & 0xFFFF };
        self.max_count = (max_count_high << 16) | max_count_low as u32;
        Ok(())
    }

    fn read_bytes(&mut self, _reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        Ok(())
    }

    fn batch_limit(&self, config: &SMBClientConfig, successor: SMBCommandCode) -> u8 {
        declared_batch_limit(config, self.command_code(), successor, &[SMBCommandCode::Close])
    }
}

/// MS-CIFS 2.2.4.42.2. A detached response had its payload delivered
/// straight from the socket, so decoding leaves `data` alone.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBReadAndXResponse {
    pub available: u16,
    pub data_compaction_mode: u16,
    pub data_length: u32,
    pub data_offset: u16,
    pub data: Vec<u8>,
    pub detached: bool,
}

impl SMBReadAndXResponse {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data_length: data.len() as u32,
            data,
            ..Default::default()
        }
    }

    pub fn detached(payload: Vec<u8>) -> Self {
        Self {
            detached: true,
            ..Self::new(payload)
        }
    }
}

impl SMBCommand for SMBReadAndXResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::ReadAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        let data_offset = align_up(writer.position() + 20 + 2, 2);
        let length = self.data.len() as u32;
        writer.write_u16(self.available)?;
        writer.write_u16(self.data_compaction_mode)?;
        writer.write_u16(0)?;
        writer.write_u16(length as u16)?;
        writer.write_u16(data_offset as u16)?;
        writer.write_u16((length >> 16) as u16)?;
        writer.write_zeros(8)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.align(2)?;
        writer.write_bytes(&self.data)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        self.available = reader.read_u16()?;
        self.data_compaction_mode = reader.read_u16()?;
        reader.skip(2);
        let length_low = reader.read_u16()?;
        self.data_offset = reader.read_u16()?;
        let length_high = reader.read_u16()?;
        reader.skip(8);
        self.data_length = ((length_high as u32) << 16) | length_low as u32;
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        if self.detached {
            return Ok(());
        }
        self.data = reader.slice_at(self.data_offset as usize, self.data_length as usize)
            .map_err(|_| SMBError::protocol_error(format!(
                "ReadAndX data of {} bytes at {} lies outside the message",
                self.data_length, self.data_offset
            )))?
            .to_vec();
        Ok(())
    }
}
