//! TRANS_TRANSACT_NMPIPE: a write then read on a message-mode named pipe.

use serde::{Deserialize, Serialize};

pub const TRANS_TRANSACT_NMPIPE: u16 = 0x26;
pub const PIPE_NAME: &str = "\\PIPE\\";
pub const WAIT_FOREVER: u32 = 0xFFFF_FFFF;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactNamedPipeRequest {
    pub fid: u16,
    pub data: Vec<u8>,
    pub max_data_count: u16,
}

impl TransactNamedPipeRequest {
    pub fn new(fid: u16, data: Vec<u8>, max_data_count: u16) -> Self {
        Self { fid, data, max_data_count }
    }

    pub(crate) fn setup(&self) -> Vec<u16> {
        vec![TRANS_TRANSACT_NMPIPE, self.fid]
    }
}

/// Whatever the pipe answered, verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactNamedPipeResponse {
    pub data: Vec<u8>,
}
