//! Cursors over one wire message.
//!
//! Every position is relative to the start of the SMB header, which is also
//! the reference point for AndX offsets, transaction offsets and Unicode
//! string alignment.

use bytes::{BufMut, BytesMut};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::byte_helper::{read_u16, read_u32, read_u64};

/// Writes one message, refusing to grow past `capacity`.
#[derive(Debug)]
pub struct WireWriter {
    buffer: BytesMut,
    capacity: usize,
    unicode: bool,
}

impl WireWriter {
    pub fn new(capacity: usize, unicode: bool) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity.min(0x1_0000)),
            capacity,
            unicode,
        }
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buffer.len())
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    fn ensure(&self, len: usize) -> SMBResult<()> {
        if self.buffer.len() + len > self.capacity {
            return Err(SMBError::precondition_failed(format!(
                "message of {} bytes does not fit in a {} byte buffer",
                self.buffer.len() + len,
                self.capacity
            )));
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> SMBResult<()> {
        self.ensure(1)?;
        self.buffer.put_u8(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> SMBResult<()> {
        self.ensure(2)?;
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> SMBResult<()> {
        self.ensure(4)?;
        self.buffer.put_u32_le(value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> SMBResult<()> {
        self.ensure(8)?;
        self.buffer.put_u64_le(value);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> SMBResult<()> {
        self.ensure(bytes.len())?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    pub fn write_zeros(&mut self, count: usize) -> SMBResult<()> {
        self.ensure(count)?;
        self.buffer.put_bytes(0, count);
        Ok(())
    }

    /// Pads with zeros up to `position`. Never moves backwards.
    pub fn pad_to(&mut self, position: usize) -> SMBResult<()> {
        let current = self.position();
        if position > current {
            self.write_zeros(position - current)?;
        }
        Ok(())
    }

    pub fn align(&mut self, alignment: usize) -> SMBResult<()> {
        let target = align_up(self.position(), alignment);
        self.pad_to(target)
    }

    /// A null terminated string in the message's negotiated encoding.
    pub fn write_string(&mut self, value: &str) -> SMBResult<()> {
        if self.unicode {
            self.write_unicode_string(value)
        } else {
            self.write_oem_string(value)
        }
    }

    pub fn write_string_unaligned(&mut self, value: &str) -> SMBResult<()> {
        if self.unicode {
            self.write_bytes(&encode_unicode(value))?;
            self.write_u16(0)
        } else {
            self.write_oem_string(value)
        }
    }

    pub fn write_unicode_string(&mut self, value: &str) -> SMBResult<()> {
        self.align(2)?;
        self.write_bytes(&encode_unicode(value))?;
        self.write_u16(0)
    }

    pub fn write_oem_string(&mut self, value: &str) -> SMBResult<()> {
        self.write_bytes(&encode_oem(value))?;
        self.write_u8(0)
    }

    pub fn patch_u8(&mut self, position: usize, value: u8) -> SMBResult<()> {
        self.patch(position, &[value])
    }

    pub fn patch_u16(&mut self, position: usize, value: u16) -> SMBResult<()> {
        self.patch(position, &value.to_le_bytes())
    }

    pub fn patch_u32(&mut self, position: usize, value: u32) -> SMBResult<()> {
        self.patch(position, &value.to_le_bytes())
    }

    fn patch(&mut self, position: usize, bytes: &[u8]) -> SMBResult<()> {
        let end = position + bytes.len();
        if end > self.buffer.len() {
            return Err(SMBError::precondition_failed(format!("patch at {} past end of message {}", position, self.buffer.len())));
        }
        self.buffer[position..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

/// Reads one received message. Reads are bounds checked; seeking is not,
/// since a declared byte count may cover payload delivered out of band.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
    unicode: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(buffer: &'a [u8], unicode: bool) -> Self {
        Self {
            buffer,
            position: 0,
            unicode,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub fn skip(&mut self, count: usize) {
        self.position += count;
    }

    pub fn align(&mut self, alignment: usize) {
        self.position = align_up(self.position, alignment);
    }

    fn check(&self, len: usize) -> SMBResult<()> {
        if self.position + len > self.buffer.len() {
            return Err(SMBError::payload_too_small(self.position + len, self.buffer.len()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> SMBResult<u8> {
        self.check(1)?;
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> SMBResult<u16> {
        self.check(2)?;
        let value = read_u16(self.buffer, self.position);
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> SMBResult<u32> {
        self.check(4)?;
        let value = read_u32(self.buffer, self.position);
        self.position += 4;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> SMBResult<u64> {
        self.check(8)?;
        let value = read_u64(self.buffer, self.position);
        self.position += 8;
        Ok(value)
    }

    pub fn read_bytes(&mut self, count: usize) -> SMBResult<&'a [u8]> {
        self.check(count)?;
        let slice = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// `count` bytes at an absolute position, leaving the cursor alone.
    pub fn slice_at(&self, position: usize, count: usize) -> SMBResult<&'a [u8]> {
        let end = position.checked_add(count)
            .ok_or_else(|| SMBError::protocol_error("slice length overflows"))?;
        self.buffer.get(position..end)
            .ok_or_else(|| SMBError::payload_too_small(end, self.buffer.len()))
    }

    /// Reads a null terminated string, never past `limit`. Unicode strings
    /// are aligned to the header first.
    pub fn read_string(&mut self, limit: usize) -> SMBResult<String> {
        if self.unicode {
            self.align(2);
            self.read_unicode_string(limit)
        } else {
            self.read_oem_string(limit)
        }
    }

    /// Some fields (the negotiate response domain name) are never aligned.
    pub fn read_string_unaligned(&mut self, limit: usize) -> SMBResult<String> {
        if self.unicode {
            self.read_unicode_string(limit)
        } else {
            self.read_oem_string(limit)
        }
    }

    pub fn read_unicode_string(&mut self, limit: usize) -> SMBResult<String> {
        let end = limit.min(self.buffer.len());
        let mut units = Vec::new();
        while self.position + 2 <= end {
            let unit = read_u16(self.buffer, self.position);
            self.position += 2;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        String::from_utf16(&units).map_err(SMBError::parse_error)
    }

    pub fn read_oem_string(&mut self, limit: usize) -> SMBResult<String> {
        let end = limit.min(self.buffer.len());
        let mut value = String::new();
        while self.position < end {
            let byte = self.buffer[self.position];
            self.position += 1;
            if byte == 0 {
                break;
            }
            value.push(byte as char);
        }
        Ok(value)
    }
}

pub fn align_up(position: usize, alignment: usize) -> usize {
    match position % alignment {
        0 => position,
        rem => position + alignment - rem,
    }
}

pub fn encode_unicode(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Latin-1; characters outside it become `?`.
pub fn encode_oem(value: &str) -> Vec<u8> {
    value.chars().map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' }).collect()
}

/// Bytes a null terminated string occupies when written at `position`.
pub fn string_wire_length(value: &str, position: usize, unicode: bool) -> usize {
    if unicode {
        let pad = align_up(position, 2) - position;
        pad + (value.encode_utf16().count() + 1) * 2
    } else {
        encode_oem(value).len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_refuses_to_exceed_capacity() {
        let mut writer = WireWriter::new(4, false);
        writer.write_u16(1).unwrap();
        writer.write_u16(2).unwrap();
        assert!(matches!(writer.write_u8(3), Err(SMBError::PreconditionFailed(_))));
        assert_eq!(writer.position(), 4);
    }

    #[test]
    fn unicode_strings_align_to_header() {
        let mut writer = WireWriter::new(64, true);
        writer.write_u8(0xAA).unwrap();
        writer.write_string("ab").unwrap();
        assert_eq!(writer.as_slice(), &[0xAA, 0x00, b'a', 0, b'b', 0, 0, 0]);
        assert_eq!(string_wire_length("ab", 1, true), 7);
    }

    #[test]
    fn oem_strings_are_single_null_terminated() {
        let mut writer = WireWriter::new(64, false);
        writer.write_u8(0xAA).unwrap();
        writer.write_string("IPC$").unwrap();
        assert_eq!(writer.as_slice(), &[0xAA, b'I', b'P', b'C', b'$', 0]);
        assert_eq!(string_wire_length("IPC$", 1, false), 5);
    }

    #[test]
    fn patches_land_in_place() {
        let mut writer = WireWriter::new(16, false);
        writer.write_zeros(4).unwrap();
        writer.patch_u16(1, 0xDEDE).unwrap();
        assert_eq!(writer.into_bytes(), vec![0, 0xDE, 0xDE, 0]);
    }

    #[test]
    fn reader_reports_short_buffers() {
        let mut reader = WireReader::new(&[1, 2, 3], false);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert!(matches!(reader.read_u16(), Err(SMBError::PayloadTooSmall(_))));
    }

    #[test]
    fn reader_strings_stop_at_terminator_or_limit() {
        let bytes = [0xAA, 0xBB, b'x', 0, b'y', 0, 0, 0, b'z'];
        let mut reader = WireReader::new(&bytes, true);
        reader.seek(1);
        assert_eq!(reader.read_string(bytes.len()).unwrap(), "xy");
        assert_eq!(reader.position(), 8);

        let mut oem = WireReader::new(b"abc", false);
        assert_eq!(oem.read_string(2).unwrap(), "ab");
    }
}
