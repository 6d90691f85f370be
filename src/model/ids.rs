//! Newtype identifiers. Thin wrappers over `String` at the boundaries where
//! mixing up id spaces (pump vs segment vs gate vs field) would be an easy,
//! silent mistake.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::FarmModelError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_newtype!(PumpId);
id_newtype!(SegmentId);
id_newtype!(GateId);
id_newtype!(FieldId);

/// Parse a gate id of the form `S3-G7` into its owning segment id and
/// within-segment sequence number.
///
/// Gate ids are always `<segment-id>-G<sequence>`; the segment id itself may
/// contain no dash, since the suffix after the final `-G` is what we split
/// on.
pub fn parse_gate_id(gate_id: &GateId) -> Result<(SegmentId, u32), FarmModelError> {
    let raw = gate_id.as_str();
    let (segment_part, seq_part) = raw
        .rsplit_once("-G")
        .ok_or_else(|| FarmModelError::MalformedGateId(raw.to_string()))?;

    if segment_part.is_empty() {
        return Err(FarmModelError::MalformedGateId(raw.to_string()));
    }

    let seq: u32 = seq_part
        .parse()
        .map_err(|_| FarmModelError::MalformedGateId(raw.to_string()))?;

    Ok((SegmentId::new(segment_part), seq))
}
