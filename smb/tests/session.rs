//! Client session tests against a scripted server.
//!
//! Each test pre-encodes the server's responses, frames them into an
//! in-memory reader and lets the session write its requests into a `Vec`.
//! The session numbers requests from mid 1, so the script answers in order.

use std::io::Cursor;

use smb_core::error::SMBError;
use smb_core::nt_status::NTStatus;

use smb_cifs::client::SMBClientSession;
use smb_cifs::config::{SMBClientConfig, SMBClientConfigBuilder};
use smb_cifs::dfs::DfsReferralContext;
use smb_cifs::protocol::body::negotiate::{SMBNegotiateResponse, SecurityMode};
use smb_cifs::protocol::body::read::SMBReadAndXResponse;
use smb_cifs::protocol::body::session_setup::SMBSessionSetupAndXResponse;
use smb_cifs::protocol::body::tree_connect::SMBTreeConnectAndXResponse;
use smb_cifs::protocol::body::{Capabilities, SMBBody, SMBEmpty, SMBLogoffAndX};
use smb_cifs::protocol::header::{SMBCommandCode, SMBFlags2, SMBHeader};
use smb_cifs::protocol::message::SMBMessage;
use smb_cifs::protocol::signing::SigningDigest;
use smb_cifs::protocol::transaction::dfs_referral::{DfsReferralEntry, DfsReferralResponse};
use smb_cifs::protocol::transaction::pipe::TransactNamedPipeRequest;
use smb_cifs::protocol::transaction::{
    TransactionKind, TransactionRequest, TransactionResponseFrame, TransactionResult, TransactionSubcommand,
};
use smb_cifs::socket::message_stream::{SMBFrameIterator, SMBSocketConnection, SMBWriteStream};
use smb_cifs::util::auth::User;
use smb_cifs::util::crypto::PasswordAuthentication;

const CHALLENGE: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
const UID: u16 = 100;
const TID: u16 = 7;

type TestSession = SMBClientSession<Cursor<Vec<u8>>, Vec<u8>>;

fn server_header(command: SMBCommandCode, mid: u16, status: NTStatus) -> SMBHeader {
    let mut header = SMBHeader::new(command, TID, 0, UID, mid).create_response_header(status.into());
    header.flags2 = SMBFlags2::UNICODE_STRINGS | SMBFlags2::ERROR_CODE_STATUS;
    header
}

fn reply(command: SMBCommandCode, mid: u16, bodies: Vec<SMBBody>) -> SMBMessage {
    let mut bodies = bodies.into_iter();
    let first = bodies.next().unwrap();
    bodies.fold(SMBMessage::new(server_header(command, mid, NTStatus::StatusSuccess), first), SMBMessage::chain)
}

fn encode(mut message: SMBMessage) -> Vec<u8> {
    message.encode(&SMBClientConfig::default(), 65535).unwrap()
}

fn sign(server: &mut SigningDigest, mut message: SMBMessage) -> Vec<u8> {
    let mut bytes = message.encode(&SMBClientConfig::default(), 65535).unwrap();
    let length = bytes.len();
    server.sign(&mut bytes, 0, length, &mut message, None).unwrap();
    bytes
}

fn negotiate_reply(security_mode: SecurityMode, max_buffer_size: u32) -> Vec<u8> {
    let negotiate = SMBNegotiateResponse::new(
        0,
        security_mode | SecurityMode::USER_SECURITY | SecurityMode::ENCRYPT_PASSWORDS,
        Capabilities::UNICODE | Capabilities::NT_SMBS | Capabilities::STATUS32,
        max_buffer_size,
        CHALLENGE.to_vec(),
    );
    encode(reply(SMBCommandCode::Negotiate, 1, vec![SMBBody::NegotiateResponse(negotiate)]))
}

fn session(config: SMBClientConfig, script: &[Vec<u8>]) -> TestSession {
    let mut stream = Vec::new();
    for frame in script {
        stream.write_frame(frame).unwrap();
    }
    SMBClientSession::new(SMBSocketConnection::new("fs1".into(), Cursor::new(stream), Vec::new()), config)
}

fn sent_frames(session: TestSession) -> Vec<Vec<u8>> {
    let (_, written) = session.into_connection().into_streams();
    SMBFrameIterator::new(&mut Cursor::new(written)).collect()
}

fn mid(frame: &[u8]) -> u16 {
    u16::from_le_bytes([frame[30], frame[31]])
}

fn user() -> User {
    User::new("CORP", "alice", "secret")
}

fn signing_config() -> SMBClientConfig {
    SMBClientConfigBuilder::default()
        .signing_enabled(true)
        .lm_compatibility(2)
        .build_config()
        .unwrap()
}

fn server_signing() -> SigningDigest {
    let authentication = PasswordAuthentication::with_client_challenge(user(), 2, &CHALLENGE, [0; 8]);
    SigningDigest::from_authentication(&authentication).unwrap().with_sequence(1)
}

// ---------------------------------------------------------------------------
// Negotiate / Session Setup
// ---------------------------------------------------------------------------

#[test]
fn test_negotiate_caps_buffer_and_keeps_unicode() {
    let mut session = session(SMBClientConfig::default(), &[negotiate_reply(SecurityMode::empty(), 4356)]);
    let negotiated = session.negotiate().unwrap();
    assert_eq!(negotiated.challenge, CHALLENGE);
    assert_eq!(session.max_buffer_size(), 4356);
    assert!(session.is_unicode());
    assert!(!session.is_signing());
}

#[test]
fn test_negotiate_rejects_mismatched_mid() {
    let negotiate = SMBNegotiateResponse::new(0, SecurityMode::USER_SECURITY, Capabilities::UNICODE, 4356, CHALLENGE.to_vec());
    let frame = encode(reply(SMBCommandCode::Negotiate, 9, vec![SMBBody::NegotiateResponse(negotiate)]));
    let mut session = session(SMBClientConfig::default(), &[frame]);
    assert!(matches!(session.negotiate(), Err(SMBError::ProtocolError(_))));
}

#[test]
fn test_required_signing_needs_server_support() {
    let config = SMBClientConfigBuilder::default().signing_required(true).build_config().unwrap();
    let mut session = session(config, &[negotiate_reply(SecurityMode::empty(), 4356)]);
    assert!(matches!(session.negotiate(), Err(SMBError::PreconditionFailed(_))));
}

#[test]
fn test_session_setup_chains_tree_connect() {
    let setup = reply(
        SMBCommandCode::SessionSetupAndX,
        2,
        vec![
            SMBBody::SessionSetupAndXResponse(SMBSessionSetupAndXResponse::default()),
            SMBBody::TreeConnectAndXResponse(SMBTreeConnectAndXResponse::new("IPC", "")),
        ],
    );
    let logoff = reply(SMBCommandCode::LogoffAndX, 3, vec![SMBBody::LogoffAndX(SMBLogoffAndX)]);
    let mut session = session(
        SMBClientConfig::default(),
        &[negotiate_reply(SecurityMode::empty(), 16644), encode(setup), encode(logoff)],
    );

    session.negotiate().unwrap();
    session.session_setup(&user(), Some("\\\\fs1\\IPC$")).unwrap();
    assert_eq!(session.uid(), UID);
    assert_eq!(session.tid(), TID);
    assert_eq!(session.user_domain().as_deref(), Some("CORP"));

    session.logoff().unwrap();
    assert_eq!(session.uid(), 0);
    assert_eq!(session.user_domain(), None);

    let frames = sent_frames(session);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1][4], SMBCommandCode::SessionSetupAndX as u8);
    assert_eq!(frames[1][33], SMBCommandCode::TreeConnectAndX as u8);
    assert_eq!(frames.iter().map(|frame| mid(frame)).collect::<Vec<_>>(), vec![1, 2, 3]);
    // logoff carries the uid the server assigned
    assert_eq!(u16::from_le_bytes([frames[2][28], frames[2][29]]), UID);
}

#[test]
fn test_rejected_password_is_auth_error() {
    let mut header = server_header(SMBCommandCode::SessionSetupAndX, 2, NTStatus::LogonFailure);
    header.uid = 0;
    let failure = SMBMessage::new(header, SMBBody::Empty(SMBEmpty::new(SMBCommandCode::SessionSetupAndX)));
    let mut session = session(signing_config(), &[negotiate_reply(SecurityMode::SIGNATURES_ENABLED, 16644), encode(failure)]);

    session.negotiate().unwrap();
    let error = session.session_setup(&user(), None).unwrap_err();
    assert!(error.is_auth_error());
    assert!(!session.is_signing());
    assert_eq!(session.user_domain(), None);
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

fn signed_script(tamper: bool) -> Vec<Vec<u8>> {
    let mut server = server_signing();
    let setup = reply(SMBCommandCode::SessionSetupAndX, 2, vec![SMBBody::SessionSetupAndXResponse(SMBSessionSetupAndXResponse::default())]);
    let tree = reply(SMBCommandCode::TreeConnectAndX, 3, vec![SMBBody::TreeConnectAndXResponse(SMBTreeConnectAndXResponse::new("A:", "NTFS"))]);
    let setup = sign(&mut server, setup);
    let mut tree = sign(&mut server, tree);
    if tamper {
        tree[24] ^= 0xFF;
    }
    vec![negotiate_reply(SecurityMode::SIGNATURES_ENABLED, 16644), setup, tree]
}

#[test]
fn test_signed_session_verifies_responses() {
    let mut session = session(signing_config(), &signed_script(false));
    session.negotiate().unwrap();
    session.session_setup(&user(), None).unwrap();
    assert!(session.is_signing());

    let tree = session.tree_connect("\\\\fs1\\share").unwrap();
    assert_eq!(tree.native_file_system, "NTFS");

    let frames = sent_frames(session);
    let flags2 = SMBFlags2::from_bits_truncate(u16::from_le_bytes([frames[2][10], frames[2][11]]));
    assert!(flags2.contains(SMBFlags2::SECURITY_SIGNATURE));
    assert_ne!(&frames[2][14..22], &[0; 8]);
    // negotiate goes out before any key exists
    assert_eq!(&frames[0][14..22], &[0; 8]);
}

#[test]
fn test_tampered_response_fails_verification() {
    let mut session = session(signing_config(), &signed_script(true));
    session.negotiate().unwrap();
    session.session_setup(&user(), None).unwrap();
    assert!(matches!(session.tree_connect("\\\\fs1\\share"), Err(SMBError::CryptoError(_))));
}

#[test]
fn test_anonymous_session_is_never_signed() {
    let setup = reply(SMBCommandCode::SessionSetupAndX, 2, vec![SMBBody::SessionSetupAndXResponse(SMBSessionSetupAndXResponse::default())]);
    let mut session = session(signing_config(), &[negotiate_reply(SecurityMode::SIGNATURES_ENABLED, 16644), encode(setup)]);
    session.negotiate().unwrap();
    session.session_setup(&User::anonymous(), None).unwrap();
    assert!(!session.is_signing());
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[test]
fn test_fragmented_pipe_transaction() {
    let pipe = TransactNamedPipeRequest::new(0x4001, vec![0x5A; 300], 1024);
    let subcommand = TransactionSubcommand::TransactNamedPipe(pipe);
    let request_frames = TransactionRequest::new(subcommand.clone(), 200, true).count();
    assert!(request_frames > 1);

    let answer = vec![b'r'; 250];
    let mut script = vec![
        negotiate_reply(SecurityMode::empty(), 4096),
        encode(reply(SMBCommandCode::Transaction, 2, vec![SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Transaction))])),
    ];
    let fragments = TransactionResponseFrame::fragments(TransactionKind::Transaction, Vec::new(), &[], &answer, 200).unwrap();
    assert!(fragments.len() > 1);
    for fragment in fragments {
        script.push(encode(reply(SMBCommandCode::Transaction, 2, vec![SMBBody::TransactionResponseFrame(fragment)])));
    }

    let config = SMBClientConfigBuilder::default().max_buffer_size(200).build_config().unwrap();
    let mut session = session(config, &script);
    session.negotiate().unwrap();
    assert_eq!(session.max_buffer_size(), 200);

    match session.send_transaction(subcommand).unwrap() {
        TransactionResult::TransactNamedPipe(response) => assert_eq!(response.data, answer),
        other => panic!("unexpected result {:?}", other),
    }

    let frames = sent_frames(session);
    assert_eq!(frames.len(), 1 + request_frames);
    assert_eq!(frames[1][4], SMBCommandCode::Transaction as u8);
    for frame in &frames[2..] {
        assert_eq!(frame[4], SMBCommandCode::TransactionSecondary as u8);
        assert!(frame.len() <= 200);
    }
    assert!(frames[1..].iter().all(|frame| mid(frame) == 2));
}

#[test]
fn test_dfs_referral_over_session() {
    let referrals = DfsReferralResponse {
        path_consumed: 10,
        referrals: vec![DfsReferralEntry {
            version: 3,
            ttl: 600,
            path: "\\CORP\\Data".into(),
            alternate_path: "\\CORP\\Data".into(),
            node: "\\fs1\\data".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let frame = TransactionResponseFrame::complete(TransactionKind::Transaction2, Vec::new(), Vec::new(), referrals.encode(true).unwrap());
    let script = [
        negotiate_reply(SecurityMode::empty(), 16644),
        encode(reply(SMBCommandCode::Transaction2, 2, vec![SMBBody::TransactionResponseFrame(frame)])),
    ];
    let mut session = session(SMBClientConfig::default(), &script);
    session.negotiate().unwrap();

    let response = session.get_referrals("dc1", "\\CORP\\Data", 3).unwrap();
    assert_eq!(response.path_consumed, 10);
    assert_eq!(response.referrals[0].node, "\\fs1\\data");
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[test]
fn test_read_lands_in_caller_buffer() {
    let read = reply(SMBCommandCode::ReadAndX, 2, vec![SMBBody::ReadAndXResponse(SMBReadAndXResponse::new(b"hello world".to_vec()))]);
    let mut session = session(SMBClientConfig::default(), &[negotiate_reply(SecurityMode::empty(), 16644), encode(read)]);
    session.negotiate().unwrap();

    let mut buffer = [0_u8; 64];
    assert_eq!(session.read(0x4001, 0, &mut buffer).unwrap(), 11);
    assert_eq!(&buffer[..11], b"hello world");
}

#[test]
fn test_failed_read_reports_status() {
    let header = server_header(SMBCommandCode::ReadAndX, 2, NTStatus::InvalidHandle);
    let failure = SMBMessage::new(header, SMBBody::Empty(SMBEmpty::new(SMBCommandCode::ReadAndX)));
    let mut session = session(SMBClientConfig::default(), &[negotiate_reply(SecurityMode::empty(), 16644), encode(failure)]);
    session.negotiate().unwrap();
    assert!(matches!(session.read(9, 0, &mut [0; 16]), Err(SMBError::ResponseError(_))));
}
