use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::byte_helper::{filetime_to_millis, millis_to_filetime};
use crate::protocol::body::create::{CreateDisposition, CreateOptions, ExtFileAttributes, ImpersonationLevel, NTCreateFlags, ShareAccess};
use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{encode_oem, WireReader, WireWriter};

const EXTENDED_WORD_COUNT: u8 = 50;
/// What servers put on the wire for an extended response, eight words short.
const EXTENDED_REPORTED_WORD_COUNT: u8 = 42;

/// MS-CIFS 2.2.4.64.1
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBNTCreateAndXRequest {
    pub flags: NTCreateFlags,
    pub root_directory_fid: u32,
    pub desired_access: u32,
    pub allocation_size: u64,
    pub ext_file_attributes: ExtFileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    pub impersonation_level: ImpersonationLevel,
    pub security_flags: u8,
    pub file_name: String,
}

impl SMBNTCreateAndXRequest {
    pub fn new(file_name: &str, desired_access: u32, create_disposition: CreateDisposition) -> Self {
        Self {
            desired_access,
            create_disposition,
            ext_file_attributes: ExtFileAttributes::NORMAL,
            share_access: ShareAccess::READ | ShareAccess::WRITE | ShareAccess::DELETE,
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn requests_extended_response(&self) -> bool {
        self.flags.contains(NTCreateFlags::REQUEST_EXTENDED_RESPONSE)
    }
}

impl SMBCommand for SMBNTCreateAndXRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::NtCreateAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        let name_length = if writer.is_unicode() {
            self.file_name.encode_utf16().count() * 2
        } else {
            encode_oem(&self.file_name).len()
        };
        writer.write_u8(0)?;
        writer.write_u16(name_length as u16)?;
        writer.write_u32(self.flags.bits())?;
        writer.write_u32(self.root_directory_fid)?;
        writer.write_u32(self.desired_access)?;
        writer.write_u64(self.allocation_size)?;
        writer.write_u32(self.ext_file_attributes.bits())?;
        writer.write_u32(self.share_access.bits())?;
        writer.write_u32(self.create_disposition.into())?;
        writer.write_u32(self.create_options.bits())?;
        writer.write_u32(self.impersonation_level.into())?;
        writer.write_u8(self.security_flags)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_string(&self.file_name)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        reader.skip(1);
        let _name_length = reader.read_u16()?;
        self.flags = NTCreateFlags::from_bits_truncate(reader.read_u32()?);
        self.root_directory_fid = reader.read_u32()?;
        self.desired_access = reader.read_u32()?;
        self.allocation_size = reader.read_u64()?;
        self.ext_file_attributes = ExtFileAttributes::from_bits_retain(reader.read_u32()?);
        self.share_access = ShareAccess::from_bits_truncate(reader.read_u32()?);
        self.create_disposition = CreateDisposition::try_from(reader.read_u32()?).unwrap_or_default();
        self.create_options = CreateOptions::from_bits_retain(reader.read_u32()?);
        self.impersonation_level = ImpersonationLevel::try_from(reader.read_u32()?).unwrap_or_default();
        self.security_flags = reader.read_u8()?;
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        self.file_name = reader.read_string(limit)?;
        Ok(())
    }
}

/// MS-CIFS 2.2.4.64.2, and the MS-SMB 2.2.4.9.2 extended form whose word
/// count servers under-report by eight.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBNTCreateAndXResponse {
    pub oplock_level: u8,
    pub fid: u16,
    pub create_action: u32,
    /// Unix milliseconds, as are the other times.
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub ext_file_attributes: ExtFileAttributes,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub resource_type: u16,
    pub nm_pipe_status: u16,
    pub directory: bool,
    /// Set before decoding when the request asked for the extended form.
    pub extended: bool,
    pub volume_guid: [u8; 16],
    pub file_id: u64,
    pub maximal_access_rights: u32,
    pub guest_maximal_access_rights: u32,
}

impl SMBNTCreateAndXResponse {
    pub fn for_request(request: &SMBNTCreateAndXRequest) -> Self {
        Self {
            extended: request.requests_extended_response(),
            ..Default::default()
        }
    }
}

impl SMBCommand for SMBNTCreateAndXResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::NtCreateAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u8(self.oplock_level)?;
        writer.write_u16(self.fid)?;
        writer.write_u32(self.create_action)?;
        for time in [self.creation_time, self.last_access_time, self.last_write_time, self.change_time] {
            writer.write_u64(millis_to_filetime(time))?;
        }
        writer.write_u32(self.ext_file_attributes.bits())?;
        writer.write_u64(self.allocation_size)?;
        writer.write_u64(self.end_of_file)?;
        writer.write_u16(self.resource_type)?;
        writer.write_u16(self.nm_pipe_status)?;
        writer.write_u8(self.directory as u8)?;
        if self.extended {
            writer.write_bytes(&self.volume_guid)?;
            writer.write_u64(self.file_id)?;
            writer.write_u32(self.maximal_access_rights)?;
            writer.write_u32(self.guest_maximal_access_rights)?;
        }
        Ok(())
    }

    fn write_bytes(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.oplock_level = reader.read_u8()?;
        self.fid = reader.read_u16()?;
        self.create_action = reader.read_u32()?;
        self.creation_time = filetime_to_millis(reader.read_u64()?);
        self.last_access_time = filetime_to_millis(reader.read_u64()?);
        self.last_write_time = filetime_to_millis(reader.read_u64()?);
        self.change_time = filetime_to_millis(reader.read_u64()?);
        self.ext_file_attributes = ExtFileAttributes::from_bits_retain(reader.read_u32()?);
        self.allocation_size = reader.read_u64()?;
        self.end_of_file = reader.read_u64()?;
        self.resource_type = reader.read_u16()?;
        self.nm_pipe_status = reader.read_u16()?;
        self.directory = reader.read_u8()? != 0;
        if self.extended && word_count >= EXTENDED_WORD_COUNT {
            self.volume_guid.copy_from_slice(reader.read_bytes(16)?);
            self.file_id = reader.read_u64()?;
            self.maximal_access_rights = reader.read_u32()?;
            self.guest_maximal_access_rights = reader.read_u32()?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, _reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        Ok(())
    }

    fn word_count_adjustment(&self, word_count: u8) -> u8 {
        if self.extended && word_count == EXTENDED_REPORTED_WORD_COUNT {
            EXTENDED_WORD_COUNT - EXTENDED_REPORTED_WORD_COUNT
        } else {
            0
        }
    }

    fn reported_word_count(&self, written: u8) -> u8 {
        if self.extended && written == EXTENDED_WORD_COUNT {
            EXTENDED_REPORTED_WORD_COUNT
        } else {
            written
        }
    }
}
