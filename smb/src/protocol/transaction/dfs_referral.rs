//! TRANS2_GET_DFS_REFERRAL, MS-DFSC 2.2.2 and 2.2.4.

use bitflags::bitflags;
use nom::bytes::complete::take;
use nom::number::complete::{le_u16, le_u32};
use nom::sequence::tuple;
use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::protocol::wire::{encode_oem, encode_unicode, WireReader};

pub const TRANS2_GET_DFS_REFERRAL: u16 = 0x10;
pub const DEFAULT_MAX_REFERRAL_LEVEL: u16 = 3;
pub const DEFAULT_MAX_DATA_COUNT: u16 = 4096;

const ENTRY_HEAD_LENGTH: usize = 8;
const V2_ENTRY_LENGTH: usize = 22;
const V3_ENTRY_LENGTH: usize = 34;
const V3_NAME_LIST_ENTRY_LENGTH: usize = 18;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ReferralHeaderFlags: u32 {
        const REFERRAL_SERVERS = 0x01;
        const STORAGE_SERVERS = 0x02;
        const TARGET_FAILBACK = 0x04;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ReferralEntryFlags: u16 {
        const NAME_LIST_REFERRAL = 0x0002;
        const TARGET_SET_BOUNDARY = 0x0004;
    }
}

/// `ServerType` of an entry pointing at a root rather than a link target.
pub const SERVER_TYPE_ROOT: u16 = 0x0001;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GetDfsReferralRequest {
    pub path: String,
    pub max_referral_level: u16,
    pub max_data_count: u16,
}

impl GetDfsReferralRequest {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.into(),
            max_referral_level: DEFAULT_MAX_REFERRAL_LEVEL,
            max_data_count: DEFAULT_MAX_DATA_COUNT,
        }
    }

    pub fn with_max_referral_level(mut self, level: u16) -> Self {
        self.max_referral_level = level;
        self
    }

    pub(crate) fn setup(&self) -> Vec<u16> {
        vec![TRANS2_GET_DFS_REFERRAL]
    }

    /// `MaxReferralLevel` then the null terminated request file name.
    pub(crate) fn parameters(&self, unicode: bool) -> SMBResult<Vec<u8>> {
        let mut parameters = self.max_referral_level.to_le_bytes().to_vec();
        if unicode {
            parameters.extend(encode_unicode(&self.path));
            parameters.extend([0, 0]);
        } else {
            parameters.extend(encode_oem(&self.path));
            parameters.push(0);
        }
        Ok(parameters)
    }

    /// Reads a request back out of its parameter block.
    pub fn from_parameters(parameters: &[u8], unicode: bool) -> SMBResult<Self> {
        let mut reader = WireReader::new(parameters, unicode);
        let max_referral_level = reader.read_u16()?;
        let path = reader.read_string_unaligned(parameters.len())?;
        Ok(Self {
            path,
            max_referral_level,
            max_data_count: DEFAULT_MAX_DATA_COUNT,
        })
    }
}

/// One `DFS_REFERRAL_V1` to `V4` entry. Fields a version does not carry are
/// left at their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DfsReferralEntry {
    pub version: u16,
    pub server_type: u16,
    pub flags: ReferralEntryFlags,
    /// Version 2 only.
    pub proximity: u32,
    /// Seconds.
    pub ttl: u32,
    pub path: String,
    pub alternate_path: String,
    /// The target, `\server\share[\path]`. Version 1 carries only this.
    pub node: String,
    pub special_name: String,
    pub expanded_names: Vec<String>,
    pub service_site_guid: [u8; 16],
}

impl DfsReferralEntry {
    pub fn is_name_list(&self) -> bool {
        self.version >= 3 && self.flags.contains(ReferralEntryFlags::NAME_LIST_REFERRAL)
    }

    fn fixed_length(&self) -> usize {
        match self.version {
            1 => ENTRY_HEAD_LENGTH,
            2 => V2_ENTRY_LENGTH,
            _ if self.is_name_list() => V3_NAME_LIST_ENTRY_LENGTH,
            _ => V3_ENTRY_LENGTH,
        }
    }
}

/// `RESP_GET_DFS_REFERRAL`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DfsReferralResponse {
    /// Characters of the request path the referral resolves.
    pub path_consumed: u16,
    pub flags: ReferralHeaderFlags,
    pub referrals: Vec<DfsReferralEntry>,
}

type NomError<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

fn malformed(_: NomError) -> SMBError {
    SMBError::parse_error("Malformed DFS referral entry")
}

impl DfsReferralResponse {
    pub fn parse(&mut self, data: &[u8], unicode: bool) -> SMBResult<()> {
        let (_, (path_consumed, count, flags)) = tuple((le_u16, le_u16, le_u32))(data)
            .map_err(|_: NomError| SMBError::parse_error("DFS referral response too short"))?;
        self.path_consumed = if unicode { path_consumed / 2 } else { path_consumed };
        self.flags = ReferralHeaderFlags::from_bits_retain(flags);
        self.referrals = Vec::with_capacity(count as usize);

        let mut start = 8;
        for _ in 0..count {
            let entry_bytes = data.get(start..)
                .ok_or_else(|| SMBError::payload_too_small(start, data.len()))?;
            let (body, (version, size, server_type, entry_flags)) =
                tuple((le_u16, le_u16, le_u16, le_u16))(entry_bytes).map_err(malformed)?;
            let mut entry = DfsReferralEntry {
                version,
                server_type,
                flags: ReferralEntryFlags::from_bits_retain(entry_flags),
                ..Default::default()
            };
            let string_at = |offset: u16| -> SMBResult<String> {
                let mut reader = WireReader::new(data, unicode);
                reader.seek(start + offset as usize);
                reader.read_string_unaligned(data.len())
            };
            match version {
                1 => {
                    let mut reader = WireReader::new(data, unicode);
                    reader.seek(start + ENTRY_HEAD_LENGTH);
                    entry.node = reader.read_string_unaligned(data.len())?;
                }
                2 => {
                    let (_, (proximity, ttl, path, alternate, node)) =
                        tuple((le_u32, le_u32, le_u16, le_u16, le_u16))(body).map_err(malformed)?;
                    entry.proximity = proximity;
                    entry.ttl = ttl;
                    entry.path = string_at(path)?;
                    entry.alternate_path = string_at(alternate)?;
                    entry.node = string_at(node)?;
                }
                3 | 4 => {
                    let (rest, ttl) = le_u32(body).map_err(malformed)?;
                    entry.ttl = ttl;
                    if entry.is_name_list() {
                        let (_, (special, expanded_count, expanded)) =
                            tuple((le_u16, le_u16, le_u16))(rest).map_err(malformed)?;
                        entry.special_name = string_at(special)?;
                        let mut reader = WireReader::new(data, unicode);
                        reader.seek(start + expanded as usize);
                        for _ in 0..expanded_count {
                            entry.expanded_names.push(reader.read_string_unaligned(data.len())?);
                        }
                    } else {
                        let (_, (path, alternate, node, guid)) =
                            tuple((le_u16, le_u16, le_u16, take(16_usize)))(rest).map_err(malformed)?;
                        entry.path = string_at(path)?;
                        entry.alternate_path = string_at(alternate)?;
                        entry.node = string_at(node)?;
                        entry.service_site_guid.copy_from_slice(guid);
                    }
                }
                _ => return Err(SMBError::parse_error(format!("Unsupported DFS referral version {}", version))),
            }
            self.referrals.push(entry);
            if size == 0 {
                break;
            }
            start += size as usize;
        }
        Ok(())
    }

    /// Entries first, then every string they point at.
    pub fn encode(&self, unicode: bool) -> SMBResult<Vec<u8>> {
        let encode_string = |value: &str| -> Vec<u8> {
            let mut bytes = if unicode { encode_unicode(value) } else { encode_oem(value) };
            bytes.extend(if unicode { &[0_u8, 0][..] } else { &[0_u8][..] });
            bytes
        };
        let path_consumed = if unicode { self.path_consumed * 2 } else { self.path_consumed };
        let mut out = Vec::new();
        out.extend(path_consumed.to_le_bytes());
        out.extend((self.referrals.len() as u16).to_le_bytes());
        out.extend(self.flags.bits().to_le_bytes());

        let entries_length: usize = self.referrals.iter()
            .map(|entry| match entry.version {
                1 => ENTRY_HEAD_LENGTH + encode_string(&entry.node).len(),
                _ => entry.fixed_length(),
            })
            .sum();
        let mut strings = Vec::new();
        let strings_start = out.len() + entries_length;
        for entry in &self.referrals {
            let start = out.len();
            let mut place = |value: &[u8]| -> SMBResult<u16> {
                let offset = strings_start + strings.len() - start;
                strings.extend_from_slice(value);
                u16::try_from(offset).map_err(|_| SMBError::precondition_failed("DFS referral too large"))
            };
            let size = match entry.version {
                1 => ENTRY_HEAD_LENGTH + encode_string(&entry.node).len(),
                _ => entry.fixed_length(),
            };
            out.extend(entry.version.to_le_bytes());
            out.extend((size as u16).to_le_bytes());
            out.extend(entry.server_type.to_le_bytes());
            out.extend(entry.flags.bits().to_le_bytes());
            match entry.version {
                1 => out.extend(encode_string(&entry.node)),
                2 => {
                    out.extend(entry.proximity.to_le_bytes());
                    out.extend(entry.ttl.to_le_bytes());
                    for value in [&entry.path, &entry.alternate_path, &entry.node] {
                        out.extend(place(&encode_string(value))?.to_le_bytes());
                    }
                }
                3 | 4 => {
                    out.extend(entry.ttl.to_le_bytes());
                    if entry.is_name_list() {
                        out.extend(place(&encode_string(&entry.special_name))?.to_le_bytes());
                        out.extend((entry.expanded_names.len() as u16).to_le_bytes());
                        let expanded: Vec<u8> = entry.expanded_names.iter().flat_map(|name| encode_string(name)).collect();
                        out.extend(place(&expanded)?.to_le_bytes());
                    } else {
                        for value in [&entry.path, &entry.alternate_path, &entry.node] {
                            out.extend(place(&encode_string(value))?.to_le_bytes());
                        }
                        out.extend(entry.service_site_guid);
                    }
                }
                version => return Err(SMBError::precondition_failed(format!("Unsupported DFS referral version {}", version))),
            }
        }
        out.extend(strings);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_entry(version: u16, node: &str) -> DfsReferralEntry {
        DfsReferralEntry {
            version,
            ttl: 600,
            path: "\\corp\\dfs\\docs".into(),
            alternate_path: "\\corp\\dfs\\docs".into(),
            node: node.into(),
            ..Default::default()
        }
    }

    #[test]
    fn request_parameters_carry_level_and_path() {
        let request = GetDfsReferralRequest::new("\\corp\\dfs");
        let parameters = request.parameters(true).unwrap();
        assert_eq!(&parameters[..2], &[3, 0]);
        assert_eq!(parameters.len(), 2 + 9 * 2 + 2);
        assert_eq!(GetDfsReferralRequest::from_parameters(&parameters, true).unwrap(), request);
    }

    #[test]
    fn parses_hand_built_v3_response() {
        let mut data = vec![0x20, 0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00];
        // entry at 8: version 3, size 34, server type 1, flags 0, ttl 300
        data.extend([3, 0, 34, 0, 1, 0, 0, 0, 0x2C, 0x01, 0, 0]);
        // path and alternate path at entry+34, node at entry+34+6
        data.extend([34, 0, 34, 0, 40, 0]);
        data.extend([0; 16]);
        data.extend(encode_unicode("\\a"));
        data.extend([0, 0]);
        data.extend(encode_unicode("\\s\\t"));
        data.extend([0, 0]);

        let mut response = DfsReferralResponse::default();
        response.parse(&data, true).unwrap();
        assert_eq!(response.path_consumed, 16);
        assert_eq!(response.flags, ReferralHeaderFlags::REFERRAL_SERVERS | ReferralHeaderFlags::STORAGE_SERVERS);
        assert_eq!(response.referrals.len(), 1);
        let entry = &response.referrals[0];
        assert_eq!(entry.server_type, SERVER_TYPE_ROOT);
        assert_eq!(entry.ttl, 300);
        assert_eq!(entry.path, "\\a");
        assert_eq!(entry.node, "\\s\\t");
    }

    #[test]
    fn every_version_survives_encoding() {
        let response = DfsReferralResponse {
            path_consumed: 14,
            flags: ReferralHeaderFlags::STORAGE_SERVERS,
            referrals: vec![
                DfsReferralEntry { version: 1, node: "\\fs1\\docs".into(), ..Default::default() },
                DfsReferralEntry { proximity: 7, ..link_entry(2, "\\fs2\\docs") },
                link_entry(3, "\\fs3\\docs"),
                DfsReferralEntry { service_site_guid: [9; 16], ..link_entry(4, "\\fs4\\docs") },
                DfsReferralEntry {
                    version: 3,
                    flags: ReferralEntryFlags::NAME_LIST_REFERRAL,
                    special_name: "\\CORP".into(),
                    expanded_names: vec!["\\dc1.corp".into(), "\\dc2.corp".into()],
                    ..Default::default()
                },
            ],
        };
        for unicode in [true, false] {
            let data = response.encode(unicode).unwrap();
            let mut parsed = DfsReferralResponse::default();
            parsed.parse(&data, unicode).unwrap();
            assert_eq!(parsed, response);
        }
    }

    #[test]
    fn unknown_version_is_parse_error() {
        let data = [0, 0, 1, 0, 0, 0, 0, 0, 9, 0, 8, 0, 0, 0, 0, 0];
        let mut response = DfsReferralResponse::default();
        assert!(matches!(response.parse(&data, true), Err(SMBError::ParseError(_))));
    }
}
