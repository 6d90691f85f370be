//! Plan Builder error taxonomy. The Builder itself never fails on a
//! well-formed `FarmConfig`; these variants cover malformed config
//! ingestion only.

#[derive(Debug, thiserror::Error)]
pub enum PlanBuildError {
    #[error("active pump id {0} not found in farm config")]
    UnknownActivePump(String),

    #[error("field {0} references unknown segment {1}")]
    DanglingSegmentReference(String, String),
}
