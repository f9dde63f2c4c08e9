use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::transaction::{TransactionFrame, TransactionResponse, TransactionResponseFrame};
use crate::protocol::wire::{WireReader, WireWriter};

pub mod capabilities;
pub mod check_directory;
pub mod close;
pub mod create;
pub mod empty;
pub mod logoff;
pub mod negotiate;
pub mod read;
pub mod session_setup;
pub mod tree_connect;
pub mod write;

pub use capabilities::Capabilities;
pub use check_directory::SMBCheckDirectoryRequest;
pub use close::SMBCloseRequest;
pub use empty::SMBEmpty;
pub use logoff::SMBLogoffAndX;

/// The per-command half of the wire format: parameter words and data bytes.
///
/// Both halves are written and read through cursors positioned relative to
/// the header start. The 4-byte AndX block, the word count and the byte count
/// belong to the chain engine, never to the command.
pub trait SMBCommand {
    fn command_code(&self) -> SMBCommandCode;

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()>;

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()>;

    /// `word_count` is the count after [`SMBCommand::word_count_adjustment`].
    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()>;

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()>;

    /// How many `successor` commands this command lets follow it in one chain.
    fn batch_limit(&self, _config: &SMBClientConfig, _successor: SMBCommandCode) -> u8 {
        0
    }

    /// Words to add to a received word count before locating the byte count.
    fn word_count_adjustment(&self, _word_count: u8) -> u8 {
        0
    }

    /// Word count to put on the wire for `written` words of parameters.
    fn reported_word_count(&self, written: u8) -> u8 {
        written
    }

    fn is_andx(&self) -> bool {
        self.command_code().is_andx()
    }
}

/// The limit configured for `predecessor.successor`, provided the predecessor
/// declares that successor at all.
pub(crate) fn declared_batch_limit(
    config: &SMBClientConfig,
    predecessor: SMBCommandCode,
    successor: SMBCommandCode,
    declared: &[SMBCommandCode],
) -> u8 {
    if declared.contains(&successor) {
        config.batch_limit(predecessor, successor)
    } else {
        0
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SMBBody {
    NegotiateRequest(negotiate::SMBNegotiateRequest),
    NegotiateResponse(negotiate::SMBNegotiateResponse),
    SessionSetupAndXRequest(session_setup::SMBSessionSetupAndXRequest),
    SessionSetupAndXResponse(session_setup::SMBSessionSetupAndXResponse),
    TreeConnectAndXRequest(tree_connect::SMBTreeConnectAndXRequest),
    TreeConnectAndXResponse(tree_connect::SMBTreeConnectAndXResponse),
    LogoffAndX(SMBLogoffAndX),
    NTCreateAndXRequest(create::SMBNTCreateAndXRequest),
    NTCreateAndXResponse(create::SMBNTCreateAndXResponse),
    ReadAndXRequest(read::SMBReadAndXRequest),
    ReadAndXResponse(read::SMBReadAndXResponse),
    WriteAndXRequest(write::SMBWriteAndXRequest),
    WriteAndXResponse(write::SMBWriteAndXResponse),
    CloseRequest(SMBCloseRequest),
    CheckDirectoryRequest(SMBCheckDirectoryRequest),
    TransactionRequest(TransactionFrame),
    TransactionResponseFrame(TransactionResponseFrame),
    TransactionResponse(TransactionResponse),
    Empty(SMBEmpty),
}

impl SMBBody {
    pub fn as_command(&self) -> &dyn SMBCommand {
        match self {
            SMBBody::NegotiateRequest(x) => x,
            SMBBody::NegotiateResponse(x) => x,
            SMBBody::SessionSetupAndXRequest(x) => x,
            SMBBody::SessionSetupAndXResponse(x) => x,
            SMBBody::TreeConnectAndXRequest(x) => x,
            SMBBody::TreeConnectAndXResponse(x) => x,
            SMBBody::LogoffAndX(x) => x,
            SMBBody::NTCreateAndXRequest(x) => x,
            SMBBody::NTCreateAndXResponse(x) => x,
            SMBBody::ReadAndXRequest(x) => x,
            SMBBody::ReadAndXResponse(x) => x,
            SMBBody::WriteAndXRequest(x) => x,
            SMBBody::WriteAndXResponse(x) => x,
            SMBBody::CloseRequest(x) => x,
            SMBBody::CheckDirectoryRequest(x) => x,
            SMBBody::TransactionRequest(x) => x,
            SMBBody::TransactionResponseFrame(x) => x,
            SMBBody::TransactionResponse(x) => x,
            SMBBody::Empty(x) => x,
        }
    }

    pub fn as_command_mut(&mut self) -> &mut dyn SMBCommand {
        match self {
            SMBBody::NegotiateRequest(x) => x,
            SMBBody::NegotiateResponse(x) => x,
            SMBBody::SessionSetupAndXRequest(x) => x,
            SMBBody::SessionSetupAndXResponse(x) => x,
            SMBBody::TreeConnectAndXRequest(x) => x,
            SMBBody::TreeConnectAndXResponse(x) => x,
            SMBBody::LogoffAndX(x) => x,
            SMBBody::NTCreateAndXRequest(x) => x,
            SMBBody::NTCreateAndXResponse(x) => x,
            SMBBody::ReadAndXRequest(x) => x,
            SMBBody::ReadAndXResponse(x) => x,
            SMBBody::WriteAndXRequest(x) => x,
            SMBBody::WriteAndXResponse(x) => x,
            SMBBody::CloseRequest(x) => x,
            SMBBody::CheckDirectoryRequest(x) => x,
            SMBBody::TransactionRequest(x) => x,
            SMBBody::TransactionResponseFrame(x) => x,
            SMBBody::TransactionResponse(x) => x,
            SMBBody::Empty(x) => x,
        }
    }

    pub fn command_code(&self) -> SMBCommandCode {
        self.as_command().command_code()
    }
}
