//! DFS resolution driven through a client session against a scripted server.

use std::io::Cursor;
use std::time::Instant;

use smb_core::nt_status::NTStatus;
use smb_core::SMBResult;

use smb_cifs::client::SMBClientSession;
use smb_cifs::config::{SMBClientConfig, SMBClientConfigBuilder};
use smb_cifs::dfs::{DfsReferral, DfsReferralContext, DfsResolver};
use smb_cifs::protocol::body::negotiate::{SMBNegotiateResponse, SecurityMode};
use smb_cifs::protocol::body::session_setup::SMBSessionSetupAndXResponse;
use smb_cifs::protocol::body::{Capabilities, SMBBody, SMBEmpty};
use smb_cifs::protocol::header::{SMBCommandCode, SMBFlags2, SMBHeader};
use smb_cifs::protocol::message::SMBMessage;
use smb_cifs::protocol::transaction::dfs_referral::{DfsReferralEntry, DfsReferralResponse, ReferralEntryFlags};
use smb_cifs::protocol::transaction::{TransactionKind, TransactionResponseFrame};
use smb_cifs::socket::message_stream::{SMBFrameIterator, SMBSocketConnection, SMBWriteStream};
use smb_cifs::util::auth::User;

type TestSession = SMBClientSession<Cursor<Vec<u8>>, Vec<u8>>;

fn encode(command: SMBCommandCode, mid: u16, status: NTStatus, body: SMBBody) -> Vec<u8> {
    let mut header = SMBHeader::new(command, 1, 0, 100, mid).create_response_header(status.into());
    header.flags2 = SMBFlags2::UNICODE_STRINGS | SMBFlags2::ERROR_CODE_STATUS;
    SMBMessage::new(header, body).encode(&SMBClientConfig::default(), 65535).unwrap()
}

fn referral_reply(mid: u16, response: &DfsReferralResponse) -> Vec<u8> {
    let frame = TransactionResponseFrame::complete(TransactionKind::Transaction2, Vec::new(), Vec::new(), response.encode(true).unwrap());
    encode(SMBCommandCode::Transaction2, mid, NTStatus::StatusSuccess, SMBBody::TransactionResponseFrame(frame))
}

fn name_list(special: &str, expanded: &[&str]) -> DfsReferralResponse {
    DfsReferralResponse {
        referrals: vec![DfsReferralEntry {
            version: 3,
            flags: ReferralEntryFlags::NAME_LIST_REFERRAL,
            ttl: 600,
            special_name: special.into(),
            expanded_names: expanded.iter().map(|name| name.to_string()).collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn targets(path_consumed: u16, nodes: &[&str]) -> DfsReferralResponse {
    DfsReferralResponse {
        path_consumed,
        referrals: nodes
            .iter()
            .map(|node| DfsReferralEntry {
                version: 3,
                ttl: 300,
                path: "\\CORP\\Data".into(),
                alternate_path: "\\CORP\\Data".into(),
                node: node.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Negotiate and session setup, then the given referral replies from mid 3.
fn logged_in_session(config: SMBClientConfig, referrals: &[Vec<u8>]) -> TestSession {
    let negotiate = SMBNegotiateResponse::new(0, SecurityMode::USER_SECURITY | SecurityMode::ENCRYPT_PASSWORDS, Capabilities::UNICODE | Capabilities::DFS, 16644, vec![7; 8]);
    let mut stream = Vec::new();
    stream.write_frame(&encode(SMBCommandCode::Negotiate, 1, NTStatus::StatusSuccess, SMBBody::NegotiateResponse(negotiate))).unwrap();
    stream.write_frame(&encode(SMBCommandCode::SessionSetupAndX, 2, NTStatus::StatusSuccess, SMBBody::SessionSetupAndXResponse(SMBSessionSetupAndXResponse::default()))).unwrap();
    for reply in referrals {
        stream.write_frame(reply).unwrap();
    }

    let mut session = SMBClientSession::new(SMBSocketConnection::new("dc1".into(), Cursor::new(stream), Vec::new()), config);
    session.negotiate().unwrap();
    session.session_setup(&User::new("CORP", "alice", "secret"), None).unwrap();
    session
}

#[test]
fn test_domain_root_resolves_over_the_wire() {
    let replies = [
        referral_reply(3, &name_list("\\CORP", &[])),
        referral_reply(4, &name_list("\\CORP", &["\\dc1.corp.example"])),
        referral_reply(5, &targets(10, &["\\fs1\\data", "\\fs2\\data"])),
    ];
    let config = SMBClientConfig::default();
    let resolver = DfsResolver::new(&config);
    let mut session = logged_in_session(config, &replies);

    let mut referral = resolver.resolve("CORP", "Data", None, &mut session).unwrap().unwrap();
    assert_eq!(referral.server(), "fs1");
    assert_eq!(referral.path_consumed, 0);
    assert_eq!(referral.redirect("\\docs\\plan.txt"), "\\fs1\\data\\docs\\plan.txt");
    assert_eq!(referral.rotate().server, "fs2");

    // served from cache: the script has nothing left to answer with
    let cached = resolver.resolve("corp", "data", None, &mut session).unwrap().unwrap();
    assert_eq!(cached.server(), "fs1");
}

#[test]
fn test_unreachable_root_resolves_to_none() {
    let denied = encode(SMBCommandCode::Transaction2, 3, NTStatus::NotFound, SMBBody::Empty(SMBEmpty::new(SMBCommandCode::Transaction2)));
    let config = SMBClientConfig::default();
    let resolver = DfsResolver::new(&config);
    let mut session = logged_in_session(config, &[denied]);

    assert!(resolver.resolve("CORP", "Data", None, &mut session).unwrap().is_none());
    assert!(!resolver.is_trusted_domain("CORP", &mut session).unwrap());
}

#[test]
fn test_disabled_resolver_sends_nothing() {
    let config = SMBClientConfigBuilder::default().dfs_disabled(true).build_config().unwrap();
    let resolver = DfsResolver::new(&config);
    let mut session = logged_in_session(config, &[]);

    assert!(resolver.resolve("CORP", "Data", Some("\\sub"), &mut session).unwrap().is_none());
    assert!(resolver.get_dc("CORP", &mut session).unwrap().is_none());
    let (_, written) = session.into_connection().into_streams();
    // negotiate and session setup only
    assert_eq!(SMBFrameIterator::new(&mut Cursor::new(written)).count(), 2);
}

#[test]
fn test_standalone_referral_redirects_below_the_link() {
    let resolver = DfsResolver::new(&SMBClientConfig::default());

    // \fs0\share\sub is 14 characters
    let referral = DfsReferral::from_response(&targets(14, &["\\fs9\\target"]), Instant::now()).unwrap();
    resolver.insert("\\fs0\\share\\sub\\file.txt", referral).unwrap();

    let resolved = resolver.resolve("fs0", "share", Some("\\SUB\\file.txt"), &mut NoDomain).unwrap().unwrap();
    assert_eq!(resolved.key.as_deref(), Some("\\fs0\\share\\sub"));
    assert_eq!(resolved.path_consumed, 4);
    assert_eq!(resolved.redirect("\\sub\\file.txt"), "\\fs9\\target\\file.txt");
}

/// A context for a user without a domain: only stand-alone referrals apply.
struct NoDomain;

impl DfsReferralContext for NoDomain {
    fn user_domain(&self) -> Option<String> {
        None
    }

    fn get_referrals(&mut self, _server: &str, _path: &str, _max_level: u16) -> SMBResult<DfsReferralResponse> {
        panic!("no referral traffic expected")
    }
}
