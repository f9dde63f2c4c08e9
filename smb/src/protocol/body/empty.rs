use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::wire::{WireReader, WireWriter};

/// A body with no parameter words and no data bytes, such as the Close
/// response or the interim response to a primary transaction.
///
/// Anything the server sends in the words or bytes is skipped, and an empty
/// body never continues a chain, even under an AndX command code.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct SMBEmpty {
    command: SMBCommandCode,
}

impl SMBEmpty {
    pub fn new(command: SMBCommandCode) -> Self {
        Self { command }
    }
}

impl SMBCommand for SMBEmpty {
    fn command_code(&self) -> SMBCommandCode {
        self.command
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

    fn is_andx(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writes_nothing() {
        let empty = SMBEmpty::new(SMBCommandCode::Close);
        let mut writer = WireWriter::new(16, false);
        empty.write_parameter_words(&mut writer).unwrap();
        empty.write_bytes(&mut writer).unwrap();
        assert_eq!(writer.position(), 0);
        assert_eq!(empty.command_code(), SMBCommandCode::Close);
    }

    #[test]
    fn empty_ignores_server_payload() {
        let mut empty = SMBEmpty::new(SMBCommandCode::Transaction);
        let mut reader = WireReader::new(&[1, 2, 3, 4], false);
        empty.read_parameter_words(&mut reader, 2).unwrap();
        empty.read_bytes(&mut reader, 4).unwrap();
        assert_eq!(reader.position(), 0);
    }
}
