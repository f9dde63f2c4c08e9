use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::byte_helper::{LocalTimeZone, utime_from_millis};
use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

/// MS-CIFS 2.2.4.5.1. The response is an [`crate::protocol::body::SMBEmpty`].
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct SMBCloseRequest {
    pub fid: u16,
    /// Raw UTime; `0xFFFFFFFF` leaves the time alone.
    pub last_write_time: u32,
}

impl SMBCloseRequest {
    pub fn new(fid: u16) -> Self {
        Self {
            fid,
            last_write_time: u32::MAX,
        }
    }

    /// `last_write_time` and `now` are Unix milliseconds; the value is
    /// corrected for daylight saving in `zone`.
    pub fn with_last_write_time<Z: LocalTimeZone + ?Sized>(fid: u16, last_write_time: i64, now: i64, zone: &Z) -> Self {
        Self {
            fid,
            last_write_time: utime_from_millis(last_write_time, now, zone),
        }
    }
}

impl SMBCommand for SMBCloseRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::Close
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.fid)?;
        writer.write_u32(self.last_write_time)
    }

    fn write_bytes(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        self.fid = reader.read_u16()?;
        self.last_write_time = reader.read_u32()?;
        Ok(())
    }

    fn read_bytes(&mut self, _reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::byte_helper::NoDaylightSaving;

    use super::*;

    #[test]
    fn close_words() {
        let request = SMBCloseRequest::with_last_write_time(0x4001, 1_000_000, 0, &NoDaylightSaving);
        let mut writer = WireWriter::new(16, false);
        request.write_parameter_words(&mut writer).unwrap();
        assert_eq!(writer.as_slice(), &[0x01, 0x40, 0xE8, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn unset_time_is_all_ones() {
        assert_eq!(SMBCloseRequest::with_last_write_time(1, 0, 5, &NoDaylightSaving).last_write_time, u32::MAX);
        assert_eq!(SMBCloseRequest::new(1).last_write_time, u32::MAX);
    }
}
