use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

/// MS-CIFS 2.2.4.54. Request and response share the same shape: the AndX
/// block and nothing else.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct SMBLogoffAndX;

impl SMBCommand for SMBLogoffAndX {
    fn command_code(&self) -> SMBCommandCode {
        SMBCommandCode::LogoffAndX
    }

    fn write_parameter_words(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn write_bytes(&self, _writer: &mut WireWriter) -> SMBResult<()> {
        Ok(())
    }

    fn read_parameter_words(&mut self, _reader: &mut WireReader, _word_count: u8) -> SMBResult<()> {
        Ok(())
    }

    fn read_bytes(&mut self, _reader: &mut WireReader, _byte_count: usize) -> SMBResult<()> {
        Ok(())
    }
}
