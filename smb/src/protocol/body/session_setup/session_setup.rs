use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::body::{Capabilities, declared_batch_limit, SMBCommand};
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

const EXTENDED_WORD_COUNT: u8 = 12;

/// MS-CIFS 2.2.4.53.1, or the MS-SMB 2.2.4.6.1 form when a security blob is
/// present.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBSessionSetupAndXRequest {
    pub max_buffer_size: u16,
    pub max_mpx_count: u16,
    pub vc_number: u16,
    pub session_key: u32,
    pub capabilities: Capabilities,
    pub case_insensitive_password: Vec<u8>,
    pub case_sensitive_password: Vec<u8>,
    pub security_blob: Option<Vec<u8>>,
    pub account_name: String,
    pub primary_domain: String,
    pub native_os: String,
    pub native_lanman: String,
}

impl SMBSessionSetupAndXRequest {
    pub fn new(config: &SMBClientConfig, session_key: u32) -> Self {
        Self {
            max_buffer_size: config.receive_buffer_size.min(u16::MAX as usize) as u16,
            max_mpx_count: config.max_mpx_count,
            vc_number: config.vc_number,
            session_key,
            capabilities: config.capabilities,
            native_os: config.native_os.clone(),
            native_lanman: config.native_lanman.clone(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, account_name: &str, primary_domain: &str, case_insensitive: Vec<u8>, case_sensitive: Vec<u8>) -> Self {
        self.account_name = account_name.into();
        self.primary_domain = primary_domain.into();
        self.case_insensitive_password = case_insensitive;
        self.case_sensitive_password = case_sensitive;
        self
    }

    pub fn with_security_blob(mut self, blob: Vec<u8>) -> Self {
        self.security_blob = Some(blob);
        self.capabilities |= Capabilities::EXTENDED_SECURITY;
        self
    }
}

impl SMBCommand for SMBSessionSetupAndXRequest {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::SessionSetupAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.max_buffer_size)?;
        writer.write_u16(self.max_mpx_count)?;
        writer.write_u16(self.vc_number)?;
        writer.write_u32(self.session_key)?;
        match &self.security_blob {
            Some(blob) => writer.write_u16(blob.len() as u16)?,
            None => {
                writer.write_u16(self.case_insensitive_password.len() as u16)?;
                writer.write_u16(self.case_sensitive_password.len() as u16)?;
            }
        }
        writer.write_u32(0)?;
        writer.write_u32(self.capabilities.bits())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        match &self.security_blob {
            Some(blob) => writer.write_bytes(blob)?,
            None => {
                writer.write_bytes(&self.case_insensitive_password)?;
                writer.write_bytes(&self.case_sensitive_password)?;
                writer.write_string(&self.account_name)?;
                writer.write_string(&self.primary_domain)?;
            }
        }
        writer.write_string(&self.native_os)?;
        writer.write_string(&self.native_lanman)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.max_buffer_size = reader.read_u16()?;
        self.max_mpx_count = reader.read_u16()?;
        self.vc_number = reader.read_u16()?;
        self.session_key = reader.read_u32()?;
        if word_count == EXTENDED_WORD_COUNT {
            let blob_length = reader.read_u16()?;
            self.security_blob = Some(vec![0; blob_length as usize]);
        } else {
            let insensitive = reader.read_u16()?;
            let sensitive = reader.read_u16()?;
            self.case_insensitive_password = vec![0; insensitive as usize];
            self.case_sensitive_password = vec![0; sensitive as usize];
        }
        reader.skip(4);
        self.capabilities = Capabilities::from_bits_truncate(reader.read_u32()?);
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        if let Some(blob) = self.security_blob.as_mut() {
            *blob = reader.read_bytes(blob.len())?.to_vec();
        } else {
            self.case_insensitive_password = reader.read_bytes(self.case_insensitive_password.len())?.to_vec();
            self.case_sensitive_password = reader.read_bytes(self.case_sensitive_password.len())?.to_vec();
            self.account_name = reader.read_string(limit)?;
            self.primary_domain = reader.read_string(limit)?;
        }
        self.native_os = reader.read_string(limit)?;
        self.native_lanman = reader.read_string(limit)?;
        Ok(())
    }

    fn batch_limit(&self, config: &SMBClientConfig, successor: SMBCommandCode) -> u8 {
        declared_batch_limit(config, self.command_code(), successor, &[SMBCommandCode::TreeConnectAndX])
    }
}

/// MS-CIFS 2.2.4.53.2. The trailing strings are optional in practice, so
/// they are read only while bytes remain.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBSessionSetupAndXResponse {
    pub action: u16,
    pub security_blob: Option<Vec<u8>>,
    pub native_os: String,
    pub native_lanman: String,
    pub primary_domain: String,
}

impl SMBSessionSetupAndXResponse {
    pub fn is_guest(&self) -> bool {
        self.action & 0x0001 != 0
    }
}

impl SMBCommand for SMBSessionSetupAndXResponse {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::SessionSetupAndX
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        writer.write_u16(self.action)?;
        if let Some(blob) = &self.security_blob {
            writer.write_u16(blob.len() as u16)?;
        }
        Ok(())
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        if let Some(blob) = &self.security_blob {
            writer.write_bytes(blob)?;
        }
        writer.write_string(&self.native_os)?;
        writer.write_string(&self.native_lanman)?;
        writer.write_string(&self.primary_domain)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.action = reader.read_u16()?;
        if word_count >= 4 {
            let blob_length = reader.read_u16()?;
            self.security_blob = Some(vec![0; blob_length as usize]);
        }
        Ok(())
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        let limit = reader.position() + byte_count;
        if let Some(blob) = self.security_blob.as_mut() {
            *blob = reader.read_bytes(blob.len())?.to_vec();
        }
        for field in [&mut self.native_os, &mut self.native_lanman, &mut self.primary_domain] {
            if reader.position() >= limit {
                break;
            }
            *field = reader.read_string(limit).unwrap_or_default();
        }
        Ok(())
    }
}
