use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::body::capabilities::Capabilities;
use crate::protocol::header::SMBCommandCode;

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 16644;
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 60416;
pub const DEFAULT_TRANSACTION_BUFFER_SIZE: usize = 0xFFFF - 512;
pub const DEFAULT_DFS_TTL: u64 = 300;

/// Client-side tunables. Every field has a default, so a builder with no
/// setters called yields a working configuration.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(default, pattern = "owned")]
#[serde(default)]
pub struct SMBClientConfig {
    pub use_batching: bool,
    pub use_unicode: bool,
    /// Keyed `"<Predecessor>.<Successor>"`, e.g. `"ReadAndX.Close"`.
    pub batch_limits: HashMap<String, u8>,
    pub max_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub transaction_buffer_size: usize,
    pub max_mpx_count: u16,
    pub pid: u16,
    pub vc_number: u16,
    pub capabilities: Capabilities,
    pub signing_enabled: bool,
    pub signing_required: bool,
    pub lm_compatibility: u8,
    #[builder(setter(into))]
    pub native_os: String,
    #[builder(setter(into))]
    pub native_lanman: String,
    pub dfs_disabled: bool,
    pub dfs_strict_view: bool,
    /// Seconds.
    pub dfs_ttl: u64,
}

impl SMBClientConfig {
    pub fn batch_key(predecessor: SMBCommandCode, successor: SMBCommandCode) -> String {
        format!("{}.{}", predecessor.batch_name(), successor.batch_name())
    }

    /// How many `successor` commands may follow `predecessor` in one chain.
    pub fn batch_limit(&self, predecessor: SMBCommandCode, successor: SMBCommandCode) -> u8 {
        self.batch_limits
            .get(&Self::batch_key(predecessor, successor))
            .copied()
            .unwrap_or(0)
    }

    pub fn with_batch_limit(mut self, predecessor: SMBCommandCode, successor: SMBCommandCode, limit: u8) -> Self {
        self.batch_limits.insert(Self::batch_key(predecessor, successor), limit);
        self
    }

    pub fn default_batch_limits() -> HashMap<String, u8> {
        use SMBCommandCode::*;
        [
            (SessionSetupAndX, TreeConnectAndX, 1),
            (TreeConnectAndX, CheckDirectory, 1),
            (TreeConnectAndX, CreateDirectory, 1),
            (TreeConnectAndX, Delete, 1),
            (TreeConnectAndX, DeleteDirectory, 1),
            (TreeConnectAndX, OpenAndX, 1),
            (TreeConnectAndX, Rename, 1),
            (TreeConnectAndX, Transaction, 1),
            (TreeConnectAndX, QueryInformation, 0),
            (OpenAndX, ReadAndX, 1),
            (ReadAndX, Close, 1),
            (WriteAndX, Close, 1),
        ]
        .into_iter()
        .map(|(predecessor, successor, limit)| (Self::batch_key(predecessor, successor), limit))
        .collect()
    }
}

impl Default for SMBClientConfig {
    fn default() -> Self {
        Self {
            use_batching: true,
            use_unicode: true,
            batch_limits: Self::default_batch_limits(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            transaction_buffer_size: DEFAULT_TRANSACTION_BUFFER_SIZE,
            max_mpx_count: 10,
            pid: rand::random(),
            vc_number: 1,
            capabilities: Capabilities::NT_SMBS | Capabilities::STATUS32 | Capabilities::UNICODE | Capabilities::DFS,
            signing_enabled: false,
            signing_required: false,
            lm_compatibility: 3,
            native_os: std::env::consts::OS.into(),
            native_lanman: "smb_cifs".into(),
            dfs_disabled: false,
            dfs_strict_view: false,
            dfs_ttl: DEFAULT_DFS_TTL,
        }
    }
}

impl SMBClientConfigBuilder {
    pub fn build_config(self) -> SMBResult<SMBClientConfig> {
        self.build().map_err(|e| SMBError::precondition_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_pairs_have_zero_limit() {
        let config = SMBClientConfig::default();
        assert_eq!(config.batch_limit(SMBCommandCode::Close, SMBCommandCode::ReadAndX), 0);
        assert_eq!(config.batch_limit(SMBCommandCode::ReadAndX, SMBCommandCode::Close), 1);
        assert_eq!(config.batch_limit(SMBCommandCode::TreeConnectAndX, SMBCommandCode::QueryInformation), 0);
    }

    #[test]
    fn batch_keys_use_command_names() {
        assert_eq!(SMBClientConfig::batch_key(SMBCommandCode::SessionSetupAndX, SMBCommandCode::TreeConnectAndX),
                   "SessionSetupAndX.TreeConnectAndX");
        assert_eq!(SMBClientConfig::batch_key(SMBCommandCode::WriteAndX, SMBCommandCode::Close), "WriteAndX.Close");
    }

    #[test]
    fn builder_defaults_and_overrides() {
        let config = SMBClientConfigBuilder::default()
            .use_batching(false)
            .dfs_ttl(60)
            .native_os("test-os")
            .build_config()
            .unwrap();
        assert!(!config.use_batching);
        assert!(config.use_unicode);
        assert_eq!(config.dfs_ttl, 60);
        assert_eq!(config.native_os, "test-os");
        assert_eq!(config.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
    }

    #[test]
    fn override_replaces_declared_limit() {
        let config = SMBClientConfig::default()
            .with_batch_limit(SMBCommandCode::ReadAndX, SMBCommandCode::Close, 0);
        assert_eq!(config.batch_limit(SMBCommandCode::ReadAndX, SMBCommandCode::Close), 0);
    }
}
