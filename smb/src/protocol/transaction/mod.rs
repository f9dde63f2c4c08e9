//! Transactions: operations whose parameters and data may span several frames.
//!
//! The three SMB1 families share one engine. A [`TransactionRequest`] is an
//! iterator of [`TransactionFrame`]s, a primary followed by as many
//! secondaries as the negotiated buffer needs. A [`TransactionResponse`]
//! collects [`TransactionResponseFrame`]s until both the parameter and the
//! data stream are complete, then parses the subcommand result.

use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::logging::trace;
use smb_core::SMBResult;

use crate::protocol::header::{SMB_HEADER_LENGTH, SMBCommandCode};
use crate::protocol::wire::{align_up, string_wire_length};

mod frame;
mod response;
pub mod dfs_referral;
pub mod notify;
pub mod pipe;

pub type TransactionFrame = frame::TransactionFrame;
pub type TransactionResponseFrame = frame::TransactionResponseFrame;
pub type TransactionResponse = response::TransactionResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Transaction,
    Transaction2,
    NtTransact,
}

impl TransactionKind {
    pub fn primary_code(&self) -> SMBCommandCode {
        match self {
            Self::Transaction => SMBCommandCode::Transaction,
            Self::Transaction2 => SMBCommandCode::Transaction2,
            Self::NtTransact => SMBCommandCode::NtTransact,
        }
    }

    pub fn secondary_code(&self) -> SMBCommandCode {
        match self {
            Self::Transaction => SMBCommandCode::TransactionSecondary,
            Self::Transaction2 => SMBCommandCode::Transaction2Secondary,
            Self::NtTransact => SMBCommandCode::NtTransactSecondary,
        }
    }

    /// The kind a command code belongs to, and whether it is a secondary.
    pub fn from_code(code: SMBCommandCode) -> Option<(Self, bool)> {
        match code {
            SMBCommandCode::Transaction => Some((Self::Transaction, false)),
            SMBCommandCode::TransactionSecondary => Some((Self::Transaction, true)),
            SMBCommandCode::Transaction2 => Some((Self::Transaction2, false)),
            SMBCommandCode::Transaction2Secondary => Some((Self::Transaction2, true)),
            SMBCommandCode::NtTransact => Some((Self::NtTransact, false)),
            SMBCommandCode::NtTransactSecondary => Some((Self::NtTransact, true)),
            _ => None,
        }
    }

    /// Parameters and data start on this boundary, measured from the header.
    pub fn alignment(&self) -> usize {
        match self {
            Self::NtTransact => 4,
            _ => 2,
        }
    }

    /// Largest total a frame of this kind can describe.
    pub fn max_total(&self) -> usize {
        match self {
            Self::NtTransact => u32::MAX as usize,
            _ => u16::MAX as usize,
        }
    }

    pub(crate) fn primary_words_length(&self, setup_count: usize) -> usize {
        let fixed = match self {
            Self::NtTransact => 38,
            _ => 28,
        };
        fixed + setup_count * 2
    }

    pub(crate) fn secondary_words_length(&self) -> usize {
        match self {
            Self::Transaction => 16,
            Self::Transaction2 => 18,
            Self::NtTransact => 36,
        }
    }

    pub(crate) fn response_words_length(&self, setup_count: usize) -> usize {
        let fixed = match self {
            Self::NtTransact => 36,
            _ => 20,
        };
        fixed + setup_count * 2
    }
}

/// The request half of each supported subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSubcommand {
    TransactNamedPipe(pipe::TransactNamedPipeRequest),
    GetDfsReferral(dfs_referral::GetDfsReferralRequest),
    NotifyChange(notify::NotifyChangeRequest),
}

impl TransactionSubcommand {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::TransactNamedPipe(_) => TransactionKind::Transaction,
            Self::GetDfsReferral(_) => TransactionKind::Transaction2,
            Self::NotifyChange(_) => TransactionKind::NtTransact,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::TransactNamedPipe(_) => Some(pipe::PIPE_NAME),
            _ => None,
        }
    }

    pub fn setup(&self) -> Vec<u16> {
        match self {
            Self::TransactNamedPipe(x) => x.setup(),
            Self::GetDfsReferral(x) => x.setup(),
            Self::NotifyChange(x) => x.setup(),
        }
    }

    pub fn function(&self) -> u16 {
        match self {
            Self::NotifyChange(_) => notify::NT_TRANSACT_NOTIFY_CHANGE,
            _ => 0,
        }
    }

    /// Carried by Transaction2 secondaries.
    pub fn fid(&self) -> u16 {
        match self {
            Self::TransactNamedPipe(x) => x.fid,
            Self::NotifyChange(x) => x.fid,
            Self::GetDfsReferral(_) => 0,
        }
    }

    pub fn timeout(&self) -> u32 {
        match self {
            Self::TransactNamedPipe(_) => pipe::WAIT_FOREVER,
            _ => 0,
        }
    }

    pub fn max_parameter_count(&self) -> u32 {
        match self {
            Self::TransactNamedPipe(_) => 0,
            Self::GetDfsReferral(_) => 0,
            Self::NotifyChange(x) => x.max_parameter_count,
        }
    }

    pub fn max_data_count(&self) -> u32 {
        match self {
            Self::TransactNamedPipe(x) => x.max_data_count as u32,
            Self::GetDfsReferral(x) => x.max_data_count as u32,
            Self::NotifyChange(_) => 0,
        }
    }

    pub fn parameters(&self, unicode: bool) -> SMBResult<Vec<u8>> {
        match self {
            Self::GetDfsReferral(x) => x.parameters(unicode),
            _ => Ok(Vec::new()),
        }
    }

    pub fn data(&self) -> Vec<u8> {
        match self {
            Self::TransactNamedPipe(x) => x.data.clone(),
            _ => Vec::new(),
        }
    }

    /// An empty result of the matching type, ready to be filled by the response.
    pub fn expected_result(&self) -> TransactionResult {
        match self {
            Self::TransactNamedPipe(_) => TransactionResult::TransactNamedPipe(pipe::TransactNamedPipeResponse::default()),
            Self::GetDfsReferral(_) => TransactionResult::GetDfsReferral(dfs_referral::DfsReferralResponse::default()),
            Self::NotifyChange(_) => TransactionResult::NotifyChange(notify::NotifyChangeResponse::default()),
        }
    }
}

/// The response half of each supported subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    TransactNamedPipe(pipe::TransactNamedPipeResponse),
    GetDfsReferral(dfs_referral::DfsReferralResponse),
    NotifyChange(notify::NotifyChangeResponse),
}

impl TransactionResult {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::TransactNamedPipe(_) => TransactionKind::Transaction,
            Self::GetDfsReferral(_) => TransactionKind::Transaction2,
            Self::NotifyChange(_) => TransactionKind::NtTransact,
        }
    }

    pub fn parse(&mut self, parameters: &[u8], data: &[u8], unicode: bool) -> SMBResult<()> {
        match self {
            Self::TransactNamedPipe(x) => {
                x.data = data.to_vec();
                Ok(())
            }
            Self::GetDfsReferral(x) => x.parse(data, unicode),
            Self::NotifyChange(x) => x.parse(parameters),
        }
    }

    pub fn parameters(&self) -> SMBResult<Vec<u8>> {
        match self {
            Self::NotifyChange(x) => x.encode(),
            _ => Ok(Vec::new()),
        }
    }

    pub fn data(&self, unicode: bool) -> SMBResult<Vec<u8>> {
        match self {
            Self::TransactNamedPipe(x) => Ok(x.data.clone()),
            Self::GetDfsReferral(x) => x.encode(unicode),
            Self::NotifyChange(_) => Ok(Vec::new()),
        }
    }
}

/// Where a frame's parameters and data land and how much of each it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameLayout {
    pub parameter_offset: usize,
    pub parameter_count: usize,
    pub data_offset: usize,
    pub data_count: usize,
}

impl FrameLayout {
    /// Fits as much of the remaining parameters, then data, as `max_buffer_size`
    /// allows when the frame's bytes begin at `bytes_start`.
    pub(crate) fn fit(
        bytes_start: usize,
        name_length: usize,
        alignment: usize,
        max_buffer_size: usize,
        parameters_remaining: usize,
        data_remaining: usize,
    ) -> Self {
        let parameter_offset = align_up(bytes_start + name_length, alignment);
        let mut available = max_buffer_size.saturating_sub(parameter_offset);
        let parameter_count = parameters_remaining.min(available);
        available -= parameter_count;
        let unpadded = parameter_offset + parameter_count;
        let data_offset = align_up(unpadded, alignment);
        available = available.saturating_sub(data_offset - unpadded);
        let data_count = data_remaining.min(available);
        Self {
            parameter_offset,
            parameter_count,
            data_offset,
            data_count,
        }
    }
}

/// A logical transaction request, produced frame by frame.
///
/// The first call to `next` encodes the subcommand's parameters and data
/// once; every call then slices off what fits in the next frame. The
/// sequence is finite and cannot be restarted.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    subcommand: TransactionSubcommand,
    max_buffer_size: usize,
    unicode: bool,
    flags: u16,
    payload: Option<(Vec<u8>, Vec<u8>)>,
    parameters_sent: usize,
    data_sent: usize,
    frames_sent: usize,
}

impl TransactionRequest {
    pub fn new(subcommand: TransactionSubcommand, max_buffer_size: usize, unicode: bool) -> Self {
        Self {
            subcommand,
            max_buffer_size,
            unicode,
            flags: 0,
            payload: None,
            parameters_sent: 0,
            data_sent: 0,
            frames_sent: 0,
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn kind(&self) -> TransactionKind {
        self.subcommand.kind()
    }

    pub fn subcommand(&self) -> &TransactionSubcommand {
        &self.subcommand
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// True until the primary is produced, and afterwards while either
    /// stream still has bytes to send.
    pub fn has_more(&self) -> bool {
        match &self.payload {
            None => true,
            Some((parameters, data)) => self.parameters_sent < parameters.len() || self.data_sent < data.len(),
        }
    }

    pub fn expected_response(&self) -> TransactionResponse {
        TransactionResponse::new(self.subcommand.expected_result())
    }

    fn next_frame(&mut self) -> SMBResult<TransactionFrame> {
        let kind = self.kind();
        if self.payload.is_none() {
            let parameters = self.subcommand.parameters(self.unicode)?;
            let data = self.subcommand.data();
            if parameters.len() > kind.max_total() || data.len() > kind.max_total() {
                return Err(SMBError::precondition_failed(format!(
                    "{:?} cannot carry {} parameter and {} data bytes",
                    kind,
                    parameters.len(),
                    data.len()
                )));
            }
            self.payload = Some((parameters, data));
        }
        let Some((parameters, data)) = self.payload.as_ref() else {
            return Err(SMBError::precondition_failed("transaction payload missing"));
        };

        let primary = self.frames_sent == 0;
        let setup = if primary { self.subcommand.setup() } else { Vec::new() };
        let name = if primary { self.subcommand.name() } else { None };
        let words_length = if primary {
            kind.primary_words_length(setup.len())
        } else {
            kind.secondary_words_length()
        };
        // a frame sent on its own: word count right after the header
        let bytes_start = SMB_HEADER_LENGTH + 1 + words_length + 2;
        let name_length = name.map_or(0, |name| string_wire_length(name, bytes_start, self.unicode));
        let layout = FrameLayout::fit(
            bytes_start,
            name_length,
            kind.alignment(),
            self.max_buffer_size,
            parameters.len() - self.parameters_sent,
            data.len() - self.data_sent,
        );

        if !primary && layout.parameter_count == 0 && layout.data_count == 0 {
            return Err(SMBError::protocol_error(format!(
                "buffer of {} bytes leaves no room for transaction payload",
                self.max_buffer_size
            )));
        }

        let frame = TransactionFrame {
            kind,
            secondary: !primary,
            total_parameter_count: parameters.len() as u32,
            total_data_count: data.len() as u32,
            max_parameter_count: self.subcommand.max_parameter_count(),
            max_data_count: self.subcommand.max_data_count(),
            max_setup_count: 0,
            flags: self.flags,
            timeout: self.subcommand.timeout(),
            function: self.subcommand.function(),
            setup,
            name: name.map(str::to_string),
            fid: self.subcommand.fid(),
            parameter_displacement: self.parameters_sent as u32,
            data_displacement: self.data_sent as u32,
            parameters: parameters[self.parameters_sent..self.parameters_sent + layout.parameter_count].to_vec(),
            data: data[self.data_sent..self.data_sent + layout.data_count].to_vec(),
            received_offsets: (0, 0),
        };
        trace!(
            kind = ?kind,
            secondary = !primary,
            parameter_displacement = self.parameters_sent,
            parameter_count = layout.parameter_count,
            data_displacement = self.data_sent,
            data_count = layout.data_count,
            "transaction frame"
        );
        self.parameters_sent += layout.parameter_count;
        self.data_sent += layout.data_count;
        self.frames_sent += 1;
        Ok(frame)
    }
}

impl Iterator for TransactionRequest {
    type Item = SMBResult<TransactionFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_more() {
            return None;
        }
        let frame = self.next_frame();
        if frame.is_err() {
            // nothing sensible follows a failed frame
            self.payload.get_or_insert_with(Default::default);
            self.parameters_sent = usize::MAX;
            self.data_sent = usize::MAX;
        }
        Some(frame)
    }
}
