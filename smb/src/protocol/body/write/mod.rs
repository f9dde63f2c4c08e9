use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::body::{declared_batch_limit, SMBCommand};
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{align_up, WireReader, WireWriter};

/// MS-CIFS 2.2.4.43.1. The payload starts on a 4-byte boundary measured
/// from the header.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBWriteAndXRequest {
    pub fid: u16,
    pub offset: u64,
    pub write_mode: u16,
    pub remaining: u16,
    pub data: Vec<u8>,
    data_offset: u16,
}

impl SMBWriteAndXRequest {
    pub fn new(fid: u16, offset: u64, data: Vec<u8>) -> Self {
        Self {
            fid,
            offset,
            data,
            ..Default::default()
        }
    }
}

impl SMBCommand for SMBWriteAndXRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::WriteAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        let data_offset = align_up(writer.position() + 26, 4);
        let length = self.data.len() as u32;
        writer.write_u16(self.fid)?;
        writer.write_u32(self.offset as u32)?;
        writer.write_u32(0)?;
        writer.write_u16(self.write_mode)?;
        writer.write_u16(self.remaining)?;
        writer.write_u16((length >> 16) as u16)?;
        writer.write_u16(length as u16)?;
        writer.write_u16(data_offset as u16)?;
        writer.write_u32((self.offset >> 32) as u32)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.align(4)?;
        writer.write_bytes(&self.data)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.fid = reader.read_u16()?;
        let offset_low = reader.read_u32()?;
        reader.skip(4);
        self.write_mode = reader.read_u16()?;
        self.remaining = reader.read_u16()?;
        let length_high = reader.read_u16()?;
        let length_low = reader.read_u16()?;
        self.data_offset = reader.read_u16()?;
        let offset_high = if word_count >= 14 { reader.read_u32()? } else { 0 };
        self.offset = ((offset_high as u64) << 32) | offset_low as u64;
        let length = ((length_high as usize) << 16) | length_low as usize;
        self.data = vec![0; length];
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        self.data = reader.slice_at(self.data_offset as usize, self.data.len())
            .map_err(|_| SMBError::protocol_error("WriteAndX data lies outside the message"))?
            .to_vec();
        Ok(())
    }

    fn batch_limit(&self, config: &SMBClientConfig, successor: SMBCommandCode) -> u8 {
        declared_batch_limit(config, self.command_code(), successor, &[SMBCommandCode::Close])
    }
}

/// MS-CIFS 2.2.4.43.2
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct SMBWriteAndXResponse {
    pub count: u32,
    pub available: u16,
}

impl SMBCommand for SMBWriteAndXResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::WriteAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.count as u16)?;
        writer.write_u16(self.available)?;
        writer.write_u16((self.count >> 16) as u16)?;
        writer.write_u16(0)
    }

    fn write_bytes(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        let low = reader.read_u16()?;
        self.available = reader.read_u16()?;
        let high = reader.read_u16()?;
        reader.skip(2);
        self.count = ((high as u32) << 16) | low as u32;
        Ok(())
    }

    fn read_bytes(&mut self, _reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        Ok(())
    }
}
