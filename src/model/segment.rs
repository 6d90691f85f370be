//! Segment — a canal section; main or branch.

use serde::{Deserialize, Serialize};

use super::ids::{GateId, PumpId, SegmentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Main,
    Branch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub canal_id: String,
    /// Smaller = further upstream.
    pub distance_rank: i64,
    pub kind: SegmentKind,
    pub regulator_gate_ids: Vec<GateId>,
    /// Pumps that can feed this segment. Empty means universally reachable,
    /// not unreachable.
    #[serde(default)]
    pub feed_by: Vec<PumpId>,
}

impl Segment {
    /// A segment is reachable iff the active-pump set intersects `feed_by`,
    /// or `feed_by` is empty (unconstrained).
    pub fn is_reachable(&self, active_pumps: &[PumpId]) -> bool {
        self.feed_by.is_empty()
            || self
                .feed_by
                .iter()
                .any(|p| active_pumps.iter().any(|active| active == p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(feed_by: Vec<&str>) -> Segment {
        Segment {
            id: SegmentId::from("S1"),
            canal_id: "C1".to_string(),
            distance_rank: 0,
            kind: SegmentKind::Main,
            regulator_gate_ids: vec![],
            feed_by: feed_by.into_iter().map(PumpId::from).collect(),
        }
    }

    #[test]
    fn empty_feed_by_is_universally_reachable() {
        let s = segment(vec![]);
        assert!(s.is_reachable(&[PumpId::from("P1")]));
        assert!(s.is_reachable(&[]));
    }

    #[test]
    fn reachable_iff_intersection_nonempty() {
        let s = segment(vec!["P1", "P2"]);
        assert!(s.is_reachable(&[PumpId::from("P2")]));
        assert!(!s.is_reachable(&[PumpId::from("P3")]));
    }
}
