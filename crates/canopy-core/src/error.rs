//! Error taxonomy for the core contract.
//!
//! Only Validation, Store, and Corruption ever surface as `Err`. Not-found,
//! Parse, and I/O outcomes are degraded results encoded on the response
//! types themselves (`Report`, `QueryResult`, `AstSummary`) rather than
//! propagated as errors — see spec §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("graph store error: {0}")]
    Store(String),

    #[error("persisted state is corrupt, rebuild required: {0}")]
    Corruption(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
