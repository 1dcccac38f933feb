use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LensError>;

/// Errors produced by the analysis engine. Each variant maps to a stable
/// error code that callers (CLI, HTTP transport) can match on.
#[derive(Debug, Clone, Error)]
pub enum LensError {
    #[error("{0}")]
    InvalidJson(String),

    #[error("{0}")]
    InvalidFixture(String),

    #[error("{0}")]
    InvalidTx(String),

    #[error("{0}")]
    InconsistentPrevouts(String),

    #[error("{0}")]
    InvalidBlock(String),

    #[error("merkle root mismatch: header={header}, computed={computed}")]
    MerkleMismatch { header: String, computed: String },

    #[error("{0}")]
    InvalidUndo(String),

    #[error("{0}")]
    InvalidCoinbase(String),

    #[error("{0}")]
    Internal(String),
}

impl LensError {
    pub fn code(&self) -> &'static str {
        match self {
            LensError::InvalidJson(_) => "INVALID_JSON",
            LensError::InvalidFixture(_) => "INVALID_FIXTURE",
            LensError::InvalidTx(_) => "INVALID_TX",
            LensError::InconsistentPrevouts(_) => "INCONSISTENT_PREVOUTS",
            LensError::InvalidBlock(_) => "INVALID_BLOCK",
            LensError::MerkleMismatch { .. } => "MERKLE_MISMATCH",
            LensError::InvalidUndo(_) => "INVALID_UNDO",
            LensError::InvalidCoinbase(_) => "INVALID_COINBASE",
            LensError::Internal(_) => "INTERNAL",
        }
    }

    /// JSON failure envelope: `{"ok": false, "error": {"code", "message"}}`.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_code_and_message() {
        let err = LensError::InvalidTx("truncated at offset 4".to_string());
        let env = err.to_envelope();
        assert!(!env.ok);
        assert_eq!(env.error.code, "INVALID_TX");
        assert_eq!(env.error.message, "truncated at offset 4");
    }

    #[test]
    fn merkle_mismatch_formats_both_roots() {
        let err = LensError::MerkleMismatch {
            header: "aa".repeat(32),
            computed: "bb".repeat(32),
        };
        assert_eq!(err.code(), "MERKLE_MISMATCH");
        assert!(err.to_string().contains(&"aa".repeat(32)));
        assert!(err.to_string().contains(&"bb".repeat(32)));
    }
}
