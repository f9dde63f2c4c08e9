use smb_core::error::SMBError;
use smb_core::logging::{debug, info, trace, warn};
use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::dfs::DfsReferralContext;
use crate::protocol::body::close::SMBCloseRequest;
use crate::protocol::body::negotiate::{SMBNegotiateRequest, SMBNegotiateResponse, SecurityMode};
use crate::protocol::body::read::{SMBReadAndXRequest, SMBReadAndXResponse};
use crate::protocol::body::session_setup::{SMBSessionSetupAndXRequest, SMBSessionSetupAndXResponse};
use crate::protocol::body::tree_connect::{SMBTreeConnectAndXRequest, SMBTreeConnectAndXResponse};
use crate::protocol::body::{Capabilities, SMBBody, SMBEmpty, SMBLogoffAndX};
use crate::protocol::header::{SMBCommandCode, SMBFlags, SMBFlags2, SMBHeader};
use crate::protocol::message::SMBMessage;
use crate::protocol::signing::SigningDigest;
use crate::protocol::transaction::dfs_referral::{DfsReferralResponse, GetDfsReferralRequest};
use crate::protocol::transaction::{TransactionRequest, TransactionResult, TransactionSubcommand};
use crate::socket::message_stream::{SMBReadStream, SMBSocketConnection, SMBWriteStream};
use crate::util::auth::User;
use crate::util::crypto::PasswordAuthentication;

/// One authenticated conversation with a server.
///
/// Every request is stamped with the session's identifiers and a fresh
/// multiplex id, encoded with the AndX chain engine, signed once signing is
/// active, and matched to a single response frame. Sends are not
/// interleaved: the session must not be shared between threads without
/// outside serialization.
#[derive(Debug)]
pub struct SMBClientSession<R: SMBReadStream, W: SMBWriteStream> {
    connection: SMBSocketConnection<R, W>,
    config: SMBClientConfig,
    server: Option<SMBNegotiateResponse>,
    user: Option<User>,
    signing: Option<SigningDigest>,
    unicode: bool,
    max_buffer_size: usize,
    uid: u16,
    tid: u16,
    mid: u16,
}

impl<R: SMBReadStream, W: SMBWriteStream> SMBClientSession<R, W> {
    pub fn new(connection: SMBSocketConnection<R, W>, config: SMBClientConfig) -> Self {
        Self {
            connection,
            unicode: config.use_unicode,
            max_buffer_size: config.max_buffer_size,
            config,
            server: None,
            user: None,
            signing: None,
            uid: 0,
            tid: 0,
            mid: 0,
        }
    }

    pub fn config(&self) -> &SMBClientConfig {
        &self.config
    }

    pub fn connection(&mut self) -> &mut SMBSocketConnection<R, W> {
        &mut self.connection
    }

    pub fn into_connection(self) -> SMBSocketConnection<R, W> {
        self.connection
    }

    pub fn negotiated(&self) -> Option<&SMBNegotiateResponse> {
        self.server.as_ref()
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    pub fn tid(&self) -> u16 {
        self.tid
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    pub fn is_signing(&self) -> bool {
        self.signing.is_some()
    }

    /// The smaller of the configured buffer and the one the server accepts.
    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    fn next_mid(&mut self) -> u16 {
        // 0xFFFF is reserved for oplock breaks
        self.mid = self.mid % (u16::MAX - 1) + 1;
        self.mid
    }

    fn header(&self, command: SMBCommandCode, mid: u16) -> SMBHeader {
        let mut header = SMBHeader::new(command, self.tid, self.config.pid, self.uid, mid);
        header.flags = SMBFlags::CASELESS_PATHNAMES | SMBFlags::CANONICAL_PATHNAMES;
        header.flags2 = SMBFlags2::KNOWS_LONG_NAMES | SMBFlags2::ERROR_CODE_STATUS;
        if self.unicode {
            header.flags2 |= SMBFlags2::UNICODE_STRINGS;
        }
        if self.signing.is_some() {
            header.flags2 |= SMBFlags2::SECURITY_SIGNATURE;
        }
        header
    }

    fn signing_wanted(&self) -> bool {
        let server_wants = self.server.as_ref().is_some_and(|server| {
            server.security_mode.contains(SecurityMode::SIGNATURES_REQUIRED)
                || (self.config.signing_enabled && server.signing_enabled())
        });
        server_wants || self.config.signing_required
    }

    /// Encodes, signs and writes `request`. When a response is expected its
    /// signing sequence number is assigned here.
    fn transmit(&mut self, request: &mut SMBMessage, response: Option<&mut SMBMessage>) -> SMBResult<()> {
        let mut bytes = request.encode(&self.config, self.max_buffer_size)?;
        if let Some(signing) = self.signing.as_mut() {
            let length = bytes.len();
            signing.sign(&mut bytes, 0, length, request, response)?;
        }
        trace!(command = ?request.header.command, mid = request.header.mid, length = bytes.len(), "sending message");
        self.connection.send_frame(&bytes)?;
        Ok(())
    }

    fn receive(&mut self, response: &mut SMBMessage, mid: u16) -> SMBResult<()> {
        let frame = self.connection.receive_frame()?;
        self.accept(&frame, response, mid)
    }

    /// Decodes a received frame and checks its multiplex id, signature and
    /// status. `response` takes the decoded frame only once the signature
    /// holds, so a rejected frame never reaches a reassembly buffer.
    fn accept(&self, frame: &[u8], response: &mut SMBMessage, mid: u16) -> SMBResult<()> {
        let mut received = response.clone();
        received.decode(frame)?;
        if received.header.mid != mid {
            return Err(SMBError::protocol_error(format!(
                "response carries mid {} while waiting for {}",
                received.header.mid, mid
            )));
        }
        let status = received.header.nt_status();
        if status.is_auth_failure() {
            // rejected credentials leave the server without a key to sign with
            return Err(SMBError::auth_error(status));
        }
        if let Some(signing) = &self.signing {
            if !signing.verify(frame, 0, &mut received) {
                response.verification = received.verification;
                return Err(SMBError::crypto_error(format!(
                    "signature verification failed for {:?} response",
                    received.header.command
                )));
            }
        }
        *response = received;
        check_status(&response.header)
    }

    fn track_identifiers(&mut self, response: &SMBMessage) {
        for body in response.bodies.iter().take(response.links) {
            match body {
                SMBBody::SessionSetupAndXResponse(_) => self.uid = response.header.uid,
                SMBBody::TreeConnectAndXResponse(_) => self.tid = response.header.tid,
                _ => {}
            }
        }
    }

    /// Sends the frame `request` encodes to and waits for its response.
    /// Links the chain engine did not put in the frame are left in
    /// [`SMBMessage::unsent`].
    pub fn exchange(&mut self, request: &mut SMBMessage, response: &mut SMBMessage) -> SMBResult<()> {
        let Some(command) = request.head().map(SMBBody::command_code) else {
            return Err(SMBError::precondition_failed("request has no body"));
        };
        let mid = self.next_mid();
        request.header = self.header(command, mid);
        self.transmit(request, Some(response))?;
        self.receive(response, mid)?;
        self.track_identifiers(response);
        Ok(())
    }

    /// Sends a whole chain, one frame after another until every link has
    /// gone out. `response` holds one template body per request link; the
    /// returned message holds them all decoded.
    pub fn send(&mut self, mut request: SMBMessage, mut response: SMBMessage) -> SMBResult<SMBMessage> {
        let mut received = Vec::with_capacity(response.bodies.len());
        loop {
            self.exchange(&mut request, &mut response)?;
            let answered = request.links.min(response.bodies.len());
            received.extend(response.bodies.drain(..answered));
            if request.links >= request.bodies.len() {
                break;
            }
            request.bodies.drain(..request.links);
            if response.bodies.is_empty() {
                return Err(SMBError::precondition_failed("no response template for an unbatched link"));
            }
            debug!(remaining = request.bodies.len(), "sending unbatched links");
        }
        response.bodies = received;
        response.links = response.bodies.len();
        Ok(response)
    }

    /// Runs one transaction: the primary frame, the interim response and
    /// secondaries when the request does not fit, then response frames
    /// until both streams are reassembled.
    pub fn send_transaction(&mut self, subcommand: TransactionSubcommand) -> SMBResult<TransactionResult> {
        let mut request = TransactionRequest::new(subcommand, self.max_buffer_size, self.unicode);
        let kind = request.kind();
        let mut response = SMBMessage::expecting(SMBBody::TransactionResponse(request.expected_response()));
        let Some(primary) = request.next() else {
            return Err(SMBError::precondition_failed("transaction produced no frames"));
        };

        let mid = self.next_mid();
        let mut message = SMBMessage::new(self.header(kind.primary_code(), mid), SMBBody::TransactionRequest(primary?));
        self.transmit(&mut message, Some(&mut response))?;

        if request.has_more() {
            let mut interim = SMBMessage::expecting(SMBBody::Empty(SMBEmpty::new(kind.primary_code())));
            interim.sign_seq = response.sign_seq;
            self.receive(&mut interim, mid)?;
            trace!(kind = ?kind, "interim transaction response");
            for frame in request.by_ref() {
                let mut secondary = SMBMessage::new(self.header(kind.secondary_code(), mid), SMBBody::TransactionRequest(frame?));
                self.transmit(&mut secondary, None)?;
            }
            debug!(kind = ?kind, frames = request.frames_sent(), "transaction request sent in fragments");
        }

        loop {
            self.receive(&mut response, mid)?;
            if matches!(response.head(), Some(SMBBody::TransactionResponse(transaction)) if transaction.is_complete()) {
                break;
            }
        }
        match response.bodies.pop() {
            Some(SMBBody::TransactionResponse(transaction)) => Ok(transaction.into_result()),
            _ => Err(SMBError::protocol_error("transaction response missing")),
        }
    }

    pub fn negotiate(&mut self) -> SMBResult<&SMBNegotiateResponse> {
        let negotiate = SMBNegotiateRequest::default();
        let dialects = negotiate.dialects.len();
        let mut request = SMBMessage::new(SMBHeader::default(), SMBBody::NegotiateRequest(negotiate));
        let mut response = SMBMessage::expecting(SMBBody::NegotiateResponse(SMBNegotiateResponse::default()));
        self.exchange(&mut request, &mut response)?;
        let Some(SMBBody::NegotiateResponse(server)) = response.bodies.pop() else {
            return Err(SMBError::protocol_error("negotiate response missing"));
        };
        if server.dialect_index as usize >= dialects {
            return Err(SMBError::protocol_error("server accepted none of the offered dialects"));
        }
        if self.config.signing_required && !server.signing_enabled() {
            return Err(SMBError::precondition_failed("signing is required but the server does not support it"));
        }
        if server.security_mode.contains(SecurityMode::SIGNATURES_REQUIRED)
            && !(self.config.signing_enabled || self.config.signing_required)
        {
            return Err(SMBError::precondition_failed("the server requires signing but it is disabled"));
        }

        self.unicode = self.config.use_unicode && server.capabilities.contains(Capabilities::UNICODE);
        if server.max_buffer_size > 0 {
            self.max_buffer_size = self.config.max_buffer_size.min(server.max_buffer_size as usize);
        }
        info!(
            max_buffer_size = self.max_buffer_size,
            unicode = self.unicode,
            security_mode = ?server.security_mode,
            "negotiated NT LM 0.12"
        );
        Ok(self.server.insert(server))
    }

    /// Authenticates `user` with challenge/response passwords, optionally
    /// connecting to `tree` in the same chain. Signing starts with this
    /// request when either side asks for it.
    pub fn session_setup(&mut self, user: &User, tree: Option<&str>) -> SMBResult<()> {
        let Some(server) = self.server.as_ref() else {
            return Err(SMBError::precondition_failed("negotiate before session setup"));
        };
        let authentication = PasswordAuthentication::new(user.clone(), self.config.lm_compatibility, &server.challenge);
        let (ansi, unicode) = if user.is_anonymous() {
            (Vec::new(), Vec::new())
        } else {
            (authentication.ansi_hash()?, authentication.unicode_hash()?)
        };
        let setup = SMBSessionSetupAndXRequest::new(&self.config, server.session_key)
            .with_credentials(&user.username, &user.domain, ansi, unicode);
        if !user.is_anonymous() && self.signing.is_none() && self.signing_wanted() {
            self.signing = Some(SigningDigest::from_authentication(&authentication)?);
        }

        let mut request = SMBMessage::new(SMBHeader::default(), SMBBody::SessionSetupAndXRequest(setup));
        let mut response = SMBMessage::expecting(SMBBody::SessionSetupAndXResponse(SMBSessionSetupAndXResponse::default()));
        if let Some(tree) = tree {
            request = request.chain(SMBBody::TreeConnectAndXRequest(SMBTreeConnectAndXRequest::new(tree)));
            response = response.chain(SMBBody::TreeConnectAndXResponse(SMBTreeConnectAndXResponse::default()));
        }
        let response = match self.send(request, response) {
            Ok(response) => response,
            Err(error) => {
                warn!(user = %user.username, %error, "session setup failed");
                self.signing = None;
                return Err(error);
            }
        };
        if let Some(SMBBody::SessionSetupAndXResponse(setup)) = response.head() {
            if setup.is_guest() {
                debug!(user = %user.username, "logged in as guest");
            }
        }
        info!(uid = self.uid, tid = self.tid, signing = self.signing.is_some(), "session established");
        self.user = Some(user.clone());
        Ok(())
    }

    pub fn tree_connect(&mut self, path: &str) -> SMBResult<SMBTreeConnectAndXResponse> {
        let request = SMBMessage::new(SMBHeader::default(), SMBBody::TreeConnectAndXRequest(SMBTreeConnectAndXRequest::new(path)));
        let response = SMBMessage::expecting(SMBBody::TreeConnectAndXResponse(SMBTreeConnectAndXResponse::default()));
        match self.send(request, response)?.bodies.pop() {
            Some(SMBBody::TreeConnectAndXResponse(tree)) => Ok(tree),
            _ => Err(SMBError::protocol_error("tree connect response missing")),
        }
    }

    /// Reads up to `buffer.len()` bytes at `offset`. The payload is read from
    /// the socket straight into `buffer` when it ends the frame.
    pub fn read(&mut self, fid: u16, offset: u64, buffer: &mut [u8]) -> SMBResult<usize> {
        let count = buffer.len().min(u32::MAX as usize) as u32;
        let mid = self.next_mid();
        let mut request = SMBMessage::new(self.header(SMBCommandCode::ReadAndX, mid), SMBBody::ReadAndXRequest(SMBReadAndXRequest::new(fid, offset, count)));
        let mut response = SMBMessage::expecting(SMBBody::ReadAndXResponse(SMBReadAndXResponse::default()));
        self.transmit(&mut request, Some(&mut response))?;

        let split = self.connection.receive_split_frame(buffer)?;
        if let Some(length) = split.payload_length {
            response.bodies = vec![SMBBody::ReadAndXResponse(SMBReadAndXResponse::detached(buffer[..length].to_vec()))];
        }
        self.accept(&split.head, &mut response, mid)?;
        match response.head() {
            Some(SMBBody::ReadAndXResponse(read)) if read.detached => Ok(read.data.len()),
            Some(SMBBody::ReadAndXResponse(read)) => {
                let length = read.data.len().min(buffer.len());
                buffer[..length].copy_from_slice(&read.data[..length]);
                Ok(length)
            }
            _ => Err(SMBError::protocol_error("read response missing")),
        }
    }

    pub fn close(&mut self, fid: u16) -> SMBResult<()> {
        let mut request = SMBMessage::new(SMBHeader::default(), SMBBody::CloseRequest(SMBCloseRequest::new(fid)));
        let mut response = SMBMessage::expecting(SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Close)));
        self.exchange(&mut request, &mut response)
    }

    /// Ends the session. Signing stops with it.
    pub fn logoff(&mut self) -> SMBResult<()> {
        let mut request = SMBMessage::new(SMBHeader::default(), SMBBody::LogoffAndX(SMBLogoffAndX));
        let mut response = SMBMessage::expecting(SMBBody::LogoffAndX(SMBLogoffAndX));
        self.exchange(&mut request, &mut response)?;
        self.uid = 0;
        self.tid = 0;
        self.signing = None;
        self.user = None;
        Ok(())
    }

    /// Sends `TRANS2_GET_DFS_REFERRAL` on the current tree, normally IPC$.
    pub fn get_dfs_referrals(&mut self, path: &str, max_level: u16) -> SMBResult<DfsReferralResponse> {
        let request = GetDfsReferralRequest::new(path).with_max_referral_level(max_level);
        match self.send_transaction(TransactionSubcommand::GetDfsReferral(request))? {
            TransactionResult::GetDfsReferral(referrals) => Ok(referrals),
            other => Err(SMBError::protocol_error(format!("expected a DFS referral, got {:?}", other.kind()))),
        }
    }
}

impl<R: SMBReadStream, W: SMBWriteStream> DfsReferralContext for SMBClientSession<R, W> {
    fn user_domain(&self) -> Option<String> {
        self.user.as_ref().map(|user| user.domain.clone()).filter(|domain| !domain.is_empty())
    }

    /// Referrals are asked of the connected server whatever `server` names.
    fn get_referrals(&mut self, server: &str, path: &str, max_level: u16) -> SMBResult<DfsReferralResponse> {
        if !server.eq_ignore_ascii_case(self.connection.name()) {
            debug!(server, connected = self.connection.name(), "referral asked of the connected server");
        }
        self.get_dfs_referrals(path, max_level)
    }
}

fn check_status(header: &SMBHeader) -> SMBResult<()> {
    let status = header.nt_status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SMBError::response_error(format!(
            "{:?} failed with status {:#010x} ({:?})",
            header.command, header.status, status
        )))
    }
}
