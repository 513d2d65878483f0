//! ICMP message-type set codec.
//!
//! Tokens are `type:code`, with `*` standing for any code. An empty set has
//! no native text at all (`None`), so it reads back as "unspecified" instead
//! of "explicitly empty".

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

const ANY_CODE_TOKEN: &str = "*";

/// One ICMP message type, optionally narrowed to a single code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IcmpTypeCode {
    pub message_type: u8,
    /// `None` matches every code of `message_type`.
    pub code: Option<u8>,
}

impl IcmpTypeCode {
    pub fn any_code(message_type: u8) -> Self {
        Self {
            message_type,
            code: None,
        }
    }

    pub fn exact(message_type: u8, code: u8) -> Self {
        Self {
            message_type,
            code: Some(code),
        }
    }

    /// Parses `type`, `type:code` or `type:*`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (message_type, code) = match token.split_once(':') {
            Some((message_type, code)) => (message_type.trim(), Some(code.trim())),
            None => (token, None),
        };
        let message_type = message_type.parse::<u8>().ok()?;
        let code = match code {
            None | Some(ANY_CODE_TOKEN) => None,
            Some(code) => Some(code.parse::<u8>().ok()?),
        };
        Some(Self { message_type, code })
    }
}

impl Display for IcmpTypeCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}:{code}", self.message_type),
            None => write!(f, "{}:{ANY_CODE_TOKEN}", self.message_type),
        }
    }
}

/// Encodes a message-type set. Empty sets encode to `None`.
pub fn encode_icmp_types(types: &BTreeSet<IcmpTypeCode>) -> Option<String> {
    if types.is_empty() {
        return None;
    }
    Some(
        types
            .iter()
            .map(IcmpTypeCode::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Decodes native message-type text, dropping malformed tokens.
///
/// Absent or blank text decodes to the empty (unspecified) set.
pub fn decode_icmp_types(value: Option<&str>) -> BTreeSet<IcmpTypeCode> {
    value
        .unwrap_or_default()
        .split(',')
        .filter_map(IcmpTypeCode::parse)
        .collect()
}
