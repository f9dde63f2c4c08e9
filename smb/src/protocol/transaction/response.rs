use std::ops::Range;

use smb_core::error::SMBError;
use smb_core::logging::{debug, trace};
use smb_core::SMBResult;

use crate::protocol::body::SMBCommand;
use crate::protocol::header::SMBCommandCode;
use crate::protocol::transaction::{TransactionKind, TransactionResponseFrame, TransactionResult};
use crate::protocol::wire::{WireReader, WireWriter};

/// Reassembles the response frames of one transaction.
///
/// The same value is handed to the decoder for every frame. Each frame's
/// parameters and data are copied at their displacements into buffers sized
/// by the first frame's totals. A fragment overlapping bytes already received
/// is rejected, so each stream is complete once its received ranges cover the
/// whole total. The subcommand result is parsed when both streams are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    kind: TransactionKind,
    result: TransactionResult,
    pub setup: Vec<u16>,
    parameters: Option<Vec<u8>>,
    data: Option<Vec<u8>>,
    parameters_received: Coverage,
    data_received: Coverage,
    frames: usize,
    current: TransactionResponseFrame,
}

impl TransactionResponse {
    pub fn new(result: TransactionResult) -> Self {
        let kind = result.kind();
        Self {
            kind,
            result,
            setup: Vec::new(),
            parameters: None,
            data: None,
            parameters_received: Coverage::default(),
            data_received: Coverage::default(),
            frames: 0,
            current: TransactionResponseFrame::new(kind),
        }
    }

    /// A finished response carrying `result` in a single frame.
    pub fn complete(result: TransactionResult, unicode: bool) -> SMBResult<Self> {
        let parameters = result.parameters()?;
        let data = result.data(unicode)?;
        let mut response = Self::new(result);
        response.current = TransactionResponseFrame::complete(response.kind, Vec::new(), parameters.clone(), data.clone());
        response.parameters_received = Coverage::whole(parameters.len());
        response.data_received = Coverage::whole(data.len());
        response.parameters = Some(parameters);
        response.data = Some(data);
        response.frames = 1;
        Ok(response)
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Every byte of both streams has arrived.
    pub fn is_complete(&self) -> bool {
        self.frames > 0
            && self.parameters_received.covered == self.parameters().len()
            && self.data_received.covered == self.data().len()
    }

    pub fn frames_received(&self) -> usize {
        self.frames
    }

    pub fn parameters(&self) -> &[u8] {
        self.parameters.as_deref().unwrap_or_default()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    pub fn result(&self) -> &TransactionResult {
        &self.result
    }

    pub fn into_result(self) -> TransactionResult {
        self.result
    }

    /// Folds one received frame into the buffers.
    pub fn accept(&mut self, frame: &TransactionResponseFrame, unicode: bool) -> SMBResult<()> {
        if self.is_complete() {
            return Err(SMBError::protocol_error("transaction frame received after completion"));
        }
        if self.frames == 0 {
            self.parameters = Some(vec![0; frame.total_parameter_count as usize]);
            self.data = Some(vec![0; frame.total_data_count as usize]);
            self.setup = frame.setup.clone();
        }
        self.frames += 1;

        copy_fragment(
            self.parameters.as_mut(),
            &mut self.parameters_received,
            frame.parameter_displacement as usize,
            &frame.parameters,
            "parameter",
        )?;
        copy_fragment(self.data.as_mut(), &mut self.data_received, frame.data_displacement as usize, &frame.data, "data")?;
        trace!(
            kind = ?self.kind,
            frame = self.frames,
            parameters_received = self.parameters_received.covered,
            data_received = self.data_received.covered,
            "transaction response frame"
        );

        if self.is_complete() {
            let (parameters, data) = (self.parameters(), self.data());
            let mut result = self.result.clone();
            result.parse(parameters, data, unicode)?;
            debug!(kind = ?self.kind, frames = self.frames, "transaction complete");
            self.result = result;
        }
        Ok(())
    }
}

/// The byte ranges of one stream received so far. Ranges never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Coverage {
    ranges: Vec<Range<usize>>,
    covered: usize,
}

impl Coverage {
    fn whole(length: usize) -> Self {
        Self {
            ranges: vec![0..length],
            covered: length,
        }
    }

    fn overlaps(&self, range: &Range<usize>) -> bool {
        self.ranges.iter().any(|received| received.start < range.end && range.start < received.end)
    }

    fn claim(&mut self, range: Range<usize>) {
        self.covered += range.len();
        self.ranges.push(range);
    }
}

fn copy_fragment(
    buffer: Option<&mut Vec<u8>>,
    coverage: &mut Coverage,
    displacement: usize,
    fragment: &[u8],
    stream: &str,
) -> SMBResult<()> {
    let Some(buffer) = buffer else {
        return Err(SMBError::protocol_error("transaction buffers not allocated"));
    };
    let end = displacement + fragment.len();
    if end > buffer.len() {
        return Err(SMBError::protocol_error(format!(
            "{} fragment {}..{} exceeds total of {} bytes",
            stream,
            displacement,
            end,
            buffer.len()
        )));
    }
    if fragment.is_empty() {
        return Ok(());
    }
    if coverage.overlaps(&(displacement..end)) {
        return Err(SMBError::protocol_error(format!(
            "{} fragment {}..{} overlaps bytes already received",
            stream, displacement, end
        )));
    }
    buffer[displacement..end].copy_from_slice(fragment);
    coverage.claim(displacement..end);
    Ok(())
}

impl SMBCommand for TransactionResponse {
    fn command_code(&self) -> SMBCommandCode {
        self.kind.primary_code()
    }

    fn write_parameter_words(&self, writer: &mut WireWriter) -> SMBResult<()> {
        self.current.write_parameter_words(writer)
    }

    fn write_bytes(&self, writer: &mut WireWriter) -> SMBResult<()> {
        self.current.write_bytes(writer)
    }

    fn read_parameter_words(&mut self, reader: &mut WireReader, word_count: u8) -> SMBResult<()> {
        self.current = TransactionResponseFrame::new(self.kind);
        self.current.read_parameter_words(reader, word_count)
    }

    fn read_bytes(&mut self, reader: &mut WireReader, byte_count: usize) -> SMBResult<()> {
        self.current.read_bytes(reader, byte_count)?;
        let frame = self.current.clone();
        self.accept(&frame, reader.is_unicode())
    }
}
