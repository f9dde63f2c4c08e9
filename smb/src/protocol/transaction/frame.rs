use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::body::SMBCommand;
use crate::protocol::header::{SMB_HEADER_LENGTH, SMBCommandCode};
use crate::protocol::transaction::{FrameLayout, TransactionKind};
use crate::protocol::wire::{align_up, string_wire_length, WireReader, WireWriter};

/// One request frame of a transaction, primary or secondary.
///
/// Offsets are not stored: they are derived from where the words land in
/// the message being written, so the same frame encodes correctly whether
/// it stands alone or follows an AndX link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFrame {
    pub kind: TransactionKind,
    pub secondary: bool,
    pub total_parameter_count: u32,
    pub total_data_count: u32,
    pub max_parameter_count: u32,
    pub max_data_count: u32,
    pub max_setup_count: u8,
    pub flags: u16,
    pub timeout: u32,
    /// NT_TRANSACT function code.
    pub function: u16,
    pub setup: Vec<u16>,
    /// Only a Transaction primary carries a name.
    pub name: Option<String>,
    /// Only a Transaction2 secondary carries a FID.
    pub fid: u16,
    pub parameter_displacement: u32,
    pub data_displacement: u32,
    pub parameters: Vec<u8>,
    pub data: Vec<u8>,
    pub(super) received_offsets: (usize, usize),
}

impl TransactionFrame {
    /// An empty frame to decode a received request into.
    pub fn expecting(code: SMBCommandCode) -> SMBResult<Self> {
        let (kind, secondary) = TransactionKind::from_code(code)
            .ok_or_else(|| SMBError::precondition_failed(format!("{:?} is not a transaction", code)))?;
        Ok(Self {
            kind,
            secondary,
            total_parameter_count: 0,
            total_data_count: 0,
            max_parameter_count: 0,
            max_data_count: 0,
            max_setup_count: 0,
            flags: 0,
            timeout: 0,
            function: 0,
            setup: Vec::new(),
            name: None,
            fid: 0,
            parameter_displacement: 0,
            data_displacement: 0,
            parameters: Vec::new(),
            data: Vec::new(),
            received_offsets: (0, 0),
        })
    }

    fn words_length(&self) -> usize {
        if self.secondary {
            self.kind.secondary_words_length()
        } else {
            self.kind.primary_words_length(self.setup.len())
        }
    }

    fn offsets(&self, words_start: usize, unicode: bool) -> (usize, usize) {
        let bytes_start = words_start + self.words_length() + 2;
        let name_length = self.name.as_deref().map_or(0, |name| string_wire_length(name, bytes_start, unicode));
        let alignment = self.kind.alignment();
        let parameter_offset = align_up(bytes_start + name_length, alignment);
        let data_offset = align_up(parameter_offset + self.parameters.len(), alignment);
        (parameter_offset, data_offset)
    }

    fn write_primary(&self, writer: &mut WireWriter, parameter_offset: usize, data_offset: usize) -> SMBResult<()> {
        if self.kind == TransactionKind::NtTransact {
            writer.write_u8(self.max_setup_count)?;
            writer.write_u16(0)?;
            writer.write_u32(self.total_parameter_count)?;
            writer.write_u32(self.total_data_count)?;
            writer.write_u32(self.max_parameter_count)?;
            writer.write_u32(self.max_data_count)?;
            writer.write_u32(self.parameters.len() as u32)?;
            writer.write_u32(parameter_offset as u32)?;
            writer.write_u32(self.data.len() as u32)?;
            writer.write_u32(data_offset as u32)?;
            writer.write_u8(self.setup.len() as u8)?;
            writer.write_u16(self.function)?;
        } else {
            writer.write_u16(self.total_parameter_count as u16)?;
            writer.write_u16(self.total_data_count as u16)?;
            writer.write_u16(self.max_parameter_count as u16)?;
            writer.write_u16(self.max_data_count as u16)?;
            writer.write_u8(self.max_setup_count)?;
            writer.write_u8(0)?;
            writer.write_u16(self.flags)?;
            writer.write_u32(self.timeout)?;
            writer.write_u16(0)?;
            writer.write_u16(self.parameters.len() as u16)?;
            writer.write_u16(parameter_offset as u16)?;
            writer.write_u16(self.data.len() as u16)?;
            writer.write_u16(data_offset as u16)?;
            writer.write_u8(self.setup.len() as u8)?;
            writer.write_u8(0)?;
        }
        for word in &self.setup {
            writer.write_u16(*word)?;
        }
        Ok(())
    }

    fn write_secondary(&self, writer: &mut WireWriter, parameter_offset: usize, data_offset: usize) -> SMBResult<()> {
        if self.kind == TransactionKind::NtTransact {
            writer.write_zeros(3)?;
            for value in [
                self.total_parameter_count,
                self.total_data_count,
                self.parameters.len() as u32,
                parameter_offset as u32,
                self.parameter_displacement,
                self.data.len() as u32,
                data_offset as u32,
                self.data_displacement,
            ] {
                writer.write_u32(value)?;
            }
            return writer.write_u8(0);
        }
        for value in [
            self.total_parameter_count as u16,
            self.total_data_count as u16,
            self.parameters.len() as u16,
            parameter_offset as u16,
            self.parameter_displacement as u16,
            self.data.len() as u16,
            data_offset as u16,
            self.data_displacement as u16,
        ] {
            writer.write_u16(value)?;
        }
        if self.kind == TransactionKind::Transaction2 {
            writer.write_u16(self.fid)?;
        }
        Ok(())
    }

    /// Reads the counts and offsets; returns (parameter count, data count).
    fn read_primary(&mut self, reader: &mut WireReader) -> SMBResult<(usize, usize)> {
        let (parameter_count, parameter_offset, data_count, data_offset, setup_count) = if self.kind == TransactionKind::NtTransact {
            self.max_setup_count = reader.read_u8()?;
            reader.skip(2);
            self.total_parameter_count = reader.read_u32()?;
            self.total_data_count = reader.read_u32()?;
            self.max_parameter_count = reader.read_u32()?;
            self.max_data_count = reader.read_u32()?;
            let parameters = (reader.read_u32()? as usize, reader.read_u32()? as usize);
            let data = (reader.read_u32()? as usize, reader.read_u32()? as usize);
            let setup_count = reader.read_u8()?;
            self.function = reader.read_u16()?;
            (parameters.0, parameters.1, data.0, data.1, setup_count)
        } else {
            self.total_parameter_count = reader.read_u16()? as u32;
            self.total_data_count = reader.read_u16()? as u32;
            self.max_parameter_count = reader.read_u16()? as u32;
            self.max_data_count = reader.read_u16()? as u32;
            self.max_setup_count = reader.read_u8()?;
            reader.skip(1);
            self.flags = reader.read_u16()?;
            self.timeout = reader.read_u32()?;
            reader.skip(2);
            let parameters = (reader.read_u16()? as usize, reader.read_u16()? as usize);
            let data = (reader.read_u16()? as usize, reader.read_u16()? as usize);
            let setup_count = reader.read_u8()?;
            reader.skip(1);
            (parameters.0, parameters.1, data.0, data.1, setup_count)
        };
        self.setup = (0..setup_count).map(|_| reader.read_u16()).collect::<SMBResult<_>>()?;
        self.parameter_displacement = 0;
        self.data_displacement = 0;
        self.received_offsets = (parameter_offset, data_offset);
        Ok((parameter_count, data_count))
    }

    fn read_secondary(&mut self, reader: &mut WireReader) -> SMBResult<(usize, usize)> {
        let mut fields = [0_u32; 8];
        if self.kind == TransactionKind::NtTransact {
            reader.skip(3);
            for field in fields.iter_mut() {
                *field = reader.read_u32()?;
            }
        } else {
            for field in fields.iter_mut() {
                *field = reader.read_u16()? as u32;
            }
            if self.kind == TransactionKind::Transaction2 {
                self.fid = reader.read_u16()?;
            }
        }
        let [total_parameters, total_data, parameter_count, parameter_offset, parameter_displacement, data_count, data_offset, data_displacement] = fields;
        self.total_parameter_count = total_parameters;
        self.total_data_count = total_data;
        self.parameter_displacement = parameter_displacement;
        self.data_displacement = data_displacement;
        self.received_offsets = (parameter_offset as usize, data_offset as usize);
        Ok((parameter_count as usize, data_count as usize))
    }
}

impl SMBCommand for TransactionFrame {
    fn command_code(&self) -> SMBCommandCode {
        if self.secondary {
            self.kind.secondary_code()
        } else {
            self.kind.primary_code()
        }
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        let (parameter_offset, data_offset) = self.offsets(writer.position(), writer.is_unicode());
        if self.secondary {
            self.write_secondary(writer, parameter_offset, data_offset)
        } else {
            self.write_primary(writer, parameter_offset, data_offset)
        }
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        if let Some(name) = &self.name {
            writer.write_string(name)?;
        }
        writer.align(self.kind.alignment())?;
        writer.write_bytes(&self.parameters)?;
        if !self.data.is_empty() {
            writer.align(self.kind.alignment())?;
            writer.write_bytes(&self.data)?;
        }
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        let (parameter_count, data_count) = if self.secondary {
            self.read_secondary(reader)?
        } else {
            self.read_primary(reader)?
        };
        // counts are parked in the payload lengths until the bytes arrive
        self.parameters = vec![0; parameter_count];
        self.data = vec![0; data_count];
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        if self.kind == TransactionKind::Transaction && !self.secondary {
            let limit = reader.position() + byte_count;
            self.name = Some(reader.read_string(limit)?);
        }
        let (parameter_offset, data_offset) = self.received_offsets;
        self.parameters = payload_slice(reader, parameter_offset, self.parameters.len())?;
        self.data = payload_slice(reader, data_offset, self.data.len())?;
        Ok(())
    }
}

/// One response frame of a transaction. Secondaries of a response reuse
/// the primary command code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponseFrame {
    pub kind: TransactionKind,
    pub total_parameter_count: u32,
    pub total_data_count: u32,
    pub setup: Vec<u16>,
    pub parameter_displacement: u32,
    pub data_displacement: u32,
    pub parameters: Vec<u8>,
    pub data: Vec<u8>,
    pub(super) received_offsets: (usize, usize),
}

impl TransactionResponseFrame {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            total_parameter_count: 0,
            total_data_count: 0,
            setup: Vec::new(),
            parameter_displacement: 0,
            data_displacement: 0,
            parameters: Vec::new(),
            data: Vec::new(),
            received_offsets: (0, 0),
        }
    }

    /// The whole payload in one frame.
    pub fn complete(kind: TransactionKind, setup: Vec<u16>, parameters: Vec<u8>, data: Vec<u8>) -> Self {
        Self {
            total_parameter_count: parameters.len() as u32,
            total_data_count: data.len() as u32,
            setup,
            parameters,
            data,
            ..Self::new(kind)
        }
    }

    /// Splits a payload into the frames a server bounded by `max_buffer_size`
    /// would send, each standing alone after the header.
    pub fn fragments(
        kind: TransactionKind,
        setup: Vec<u16>,
        parameters: &[u8],
        data: &[u8],
        max_buffer_size: usize,
    ) -> SMBResult<Vec<Self>> {
        let bytes_start = SMB_HEADER_LENGTH + 1 + kind.response_words_length(setup.len()) + 2;
        let (mut parameters_sent, mut data_sent) = (0, 0);
        let mut frames = Vec::new();
        loop {
            let layout = FrameLayout::fit(
                bytes_start,
                0,
                kind.alignment(),
                max_buffer_size,
                parameters.len() - parameters_sent,
                data.len() - data_sent,
            );
            let finished = parameters_sent + layout.parameter_count >= parameters.len()
                && data_sent + layout.data_count >= data.len();
            if !frames.is_empty() && layout.parameter_count == 0 && layout.data_count == 0 && !finished {
                return Err(SMBError::protocol_error("response buffer leaves no room for transaction payload"));
            }
            frames.push(Self {
                total_parameter_count: parameters.len() as u32,
                total_data_count: data.len() as u32,
                setup: setup.clone(),
                parameter_displacement: parameters_sent as u32,
                data_displacement: data_sent as u32,
                parameters: parameters[parameters_sent..parameters_sent + layout.parameter_count].to_vec(),
                data: data[data_sent..data_sent + layout.data_count].to_vec(),
                ..Self::new(kind)
            });
            parameters_sent += layout.parameter_count;
            data_sent += layout.data_count;
            if finished {
                return Ok(frames);
            }
        }
    }

    fn offsets(&self, words_start: usize) -> (usize, usize) {
        let bytes_start = words_start + self.kind.response_words_length(self.setup.len()) + 2;
        let alignment = self.kind.alignment();
        let parameter_offset = align_up(bytes_start, alignment);
        let data_offset = align_up(parameter_offset + self.parameters.len(), alignment);
        (parameter_offset, data_offset)
    }
}

impl SMBCommand for TransactionResponseFrame {
    fn command_code(&self) -> SMBCommandCode {
        self.kind.primary_code()
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        let (parameter_offset, data_offset) = self.offsets(writer.position());
        if self.kind == TransactionKind::NtTransact {
            writer.write_zeros(3)?;
            for value in [
                self.total_parameter_count,
                self.total_data_count,
                self.parameters.len() as u32,
                parameter_offset as u32,
                self.parameter_displacement,
                self.data.len() as u32,
                data_offset as u32,
                self.data_displacement,
            ] {
                writer.write_u32(value)?;
            }
            writer.write_u8(self.setup.len() as u8)?;
        } else {
            writer.write_u16(self.total_parameter_count as u16)?;
            writer.write_u16(self.total_data_count as u16)?;
            writer.write_u16(0)?;
            for value in [
                self.parameters.len() as u16,
                parameter_offset as u16,
                self.parameter_displacement as u16,
                self.data.len() as u16,
                data_offset as u16,
                self.data_displacement as u16,
            ] {
                writer.write_u16(value)?;
            }
            writer.write_u8(self.setup.len() as u8)?;
            writer.write_u8(0)?;
        }
        for word in &self.setup {
            writer.write_u16(*word)?;
        }
        Ok(())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.align(self.kind.alignment())?;
        writer.write_bytes(&self.parameters)?;
        if !self.data.is_empty() {
            writer.align(self.kind.alignment())?;
            writer.write_bytes(&self.data)?;
        }
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        let mut fields = [0_u32; 8];
        let setup_count = if self.kind == TransactionKind::NtTransact {
            reader.skip(3);
            for field in fields.iter_mut() {
                *field = reader.read_u32()?;
            }
            reader.read_u8()?
        } else {
            fields[0] = reader.read_u16()? as u32;
            fields[1] = reader.read_u16()? as u32;
            reader.skip(2);
            for field in fields[2..].iter_mut() {
                *field = reader.read_u16()? as u32;
            }
            let setup_count = reader.read_u8()?;
            reader.skip(1);
            setup_count
        };
        let [total_parameters, total_data, parameter_count, parameter_offset, parameter_displacement, data_count, data_offset, data_displacement] = fields;
        self.total_parameter_count = total_parameters;
        self.total_data_count = total_data;
        self.parameter_displacement = parameter_displacement;
        self.data_displacement = data_displacement;
        self.setup = (0..setup_count).map(|_| reader.read_u16()).collect::<SMBResult<_>>()?;
        self.received_offsets = (parameter_offset as usize, data_offset as usize);
        self.parameters = vec![0; parameter_count as usize];
        self.data = vec![0; data_count as usize];
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        let (parameter_offset, data_offset) = self.received_offsets;
        self.parameters = payload_slice(reader, parameter_offset, self.parameters.len())?;
        self.data = payload_slice(reader, data_offset, self.data.len())?;
        Ok(())
    }
}

fn payload_slice(reader: &WireReader, offset: usize, count: usize) -> SMBResult<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    reader.slice_at(offset, count)
        .map(<[u8]>::to_vec)
        .map_err(|_| SMBError::protocol_error(format!(
            "transaction payload of {} bytes at offset {} exceeds the {} byte message",
            count,
            offset,
            reader.len()
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standalone(frame: &dyn SMBCommand, unicode: bool) -> Vec<u8> {
        let mut writer = WireWriter::new(0x1_0000, unicode);
        writer.write_zeros(SMB_HEADER_LENGTH).unwrap();
        writer.write_u8(0).unwrap();
        let words_start = writer.position();
        frame.write_parameter_words(&mut writer).unwrap();
        let word_count = (writer.position() - words_start) / 2;
        writer.patch_u8(SMB_HEADER_LENGTH, word_count as u8).unwrap();
        let byte_count_position = writer.position();
        writer.write_u16(0).unwrap();
        let bytes_start = writer.position();
        frame.write_bytes(&mut writer).unwrap();
        writer.patch_u16(byte_count_position, (writer.position() - bytes_start) as u16).unwrap();
        writer.into_bytes()
    }

    fn read_back<T: SMBCommand>(bytes: &[u8], target: &mut T, unicode: bool) {
        let mut reader = WireReader::new(bytes, unicode);
        reader.seek(SMB_HEADER_LENGTH);
        let word_count = reader.read_u8().unwrap();
        target.read_parameter_words(&mut reader, word_count).unwrap();
        reader.seek(SMB_HEADER_LENGTH + 1 + word_count as usize * 2);
        let byte_count = reader.read_u16().unwrap() as usize;
        target.read_bytes(&mut reader, byte_count).unwrap();
    }

    fn trans2_primary() -> TransactionFrame {
        TransactionFrame {
            total_parameter_count: 5,
            total_data_count: 3,
            max_data_count: 4096,
            setup: vec![0x10],
            parameters: vec![1, 2, 3, 4, 5],
            data: vec![7, 8, 9],
            ..TransactionFrame::expecting(SMBCommandCode::Transaction2).unwrap()
        }
    }

    #[test]
    fn primary_offsets_are_aligned_from_the_header() {
        let bytes = standalone(&trans2_primary(), false);
        // 15 words
        assert_eq!(bytes[32], 15);
        let parameter_offset = u16::from_le_bytes([bytes[53], bytes[54]]) as usize;
        let data_offset = u16::from_le_bytes([bytes[57], bytes[58]]) as usize;
        // words end at 63, byte count at 63..65
        assert_eq!(parameter_offset, 66);
        assert_eq!(&bytes[parameter_offset..parameter_offset + 5], &[1, 2, 3, 4, 5]);
        assert_eq!(data_offset, 72);
        assert_eq!(&bytes[data_offset..data_offset + 3], &[7, 8, 9]);
    }

    #[test]
    fn primary_request_parses_back() {
        let frame = trans2_primary();
        let bytes = standalone(&frame, true);
        let mut parsed = TransactionFrame::expecting(SMBCommandCode::Transaction2).unwrap();
        read_back(&bytes, &mut parsed, true);
        parsed.received_offsets = (0, 0);
        assert_eq!(parsed, frame);
    }

    #[test]
    fn named_nt_and_secondary_frames_parse_back() {
        let mut named = TransactionFrame::expecting(SMBCommandCode::Transaction).unwrap();
        named.name = Some("\\PIPE\\".into());
        named.setup = vec![0x26, 0x4000];
        named.data = b"bind".to_vec();
        named.total_data_count = 4;

        let mut nt = TransactionFrame::expecting(SMBCommandCode::NtTransact).unwrap();
        nt.function = 4;
        nt.setup = vec![1, 0, 0x4000, 1];
        nt.max_parameter_count = 4096;

        let mut secondary = TransactionFrame::expecting(SMBCommandCode::Transaction2Secondary).unwrap();
        secondary.total_data_count = 100;
        secondary.data_displacement = 60;
        secondary.data = vec![0xAB; 40];
        secondary.fid = 7;

        for frame in [named, nt, secondary] {
            for unicode in [false, true] {
                let bytes = standalone(&frame, unicode);
                let mut parsed = TransactionFrame::expecting(frame.command_code()).unwrap();
                read_back(&bytes, &mut parsed, unicode);
                parsed.received_offsets = (0, 0);
                assert_eq!(parsed, frame);
            }
        }
    }

    #[test]
    fn nt_payload_is_four_byte_aligned() {
        let mut frame = TransactionFrame::expecting(SMBCommandCode::NtTransactSecondary).unwrap();
        frame.parameters = vec![1];
        frame.data = vec![2];
        let bytes = standalone(&frame, false);
        let parameter_offset = u32::from_le_bytes(bytes[48..52].try_into().unwrap()) as usize;
        let data_offset = u32::from_le_bytes(bytes[60..64].try_into().unwrap()) as usize;
        assert_eq!(parameter_offset % 4, 0);
        assert_eq!(data_offset, parameter_offset + 4);
        assert_eq!(bytes[data_offset], 2);
    }

    #[test]
    fn response_offset_past_end_is_protocol_error() {
        let frame = TransactionResponseFrame::complete(TransactionKind::Transaction2, Vec::new(), vec![1, 2], vec![3; 10]);
        let mut bytes = standalone(&frame, false);
        bytes.truncate(bytes.len() - 4);
        let mut reader = WireReader::new(&bytes, false);
        reader.seek(SMB_HEADER_LENGTH + 1);
        let mut parsed = TransactionResponseFrame::new(TransactionKind::Transaction2);
        parsed.read_parameter_words(&mut reader, 10).unwrap();
        let result = parsed.read_bytes(&mut reader, 0);
        assert!(matches!(result, Err(SMBError::ProtocolError(_))));
    }

    #[test]
    fn response_fragments_cover_the_payload() {
        let data: Vec<u8> = (0..=255).collect();
        let frames = TransactionResponseFrame::fragments(TransactionKind::NtTransact, Vec::new(), &[9; 8], &data, 150).unwrap();
        assert!(frames.len() > 1);
        assert_eq!(frames[0].parameters, vec![9; 8]);
        let joined: Vec<u8> = frames.iter().flat_map(|frame| frame.data.clone()).collect();
        assert_eq!(joined, data);
        for frame in &frames {
            assert!(standalone(frame, false).len() <= 150);
        }
    }
}
