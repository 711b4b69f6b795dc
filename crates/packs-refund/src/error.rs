//! Refund routing errors.

use packs_core::ValidationError;
use packs_ledger::LedgerError;
use thiserror::Error;

/// Errors arising from refund submission and resolution.
#[derive(Error, Debug)]
pub enum RefundError {
    /// The reason code is never refundable.
    #[error("refund reason \"{0}\" is not eligible for a refund")]
    DisallowedReason(String),

    /// Only the payer may request a refund.
    #[error("only the payer of {escrow_id} may request a refund")]
    NotPayer {
        /// The escrow identifier.
        escrow_id: String,
    },

    /// The escrow is not HELD.
    #[error("escrow {escrow_id} is {status}; refunds can only be requested while HELD")]
    EscrowNotRefundable {
        /// The escrow identifier.
        escrow_id: String,
        /// Current escrow status.
        status: String,
    },

    /// The refund window has closed.
    #[error("refund window for {escrow_id} closed at {deadline}")]
    RefundWindowClosed {
        /// The escrow identifier.
        escrow_id: String,
        /// The release deadline (RFC 3339).
        deadline: String,
    },

    /// Another request for this escrow is still open.
    #[error("refund request {request_id} for {escrow_id} is still pending")]
    DuplicatePending {
        /// The escrow identifier.
        escrow_id: String,
        /// The open request.
        request_id: String,
    },

    /// A tier-1 reason was submitted without delivery evidence.
    #[error("delivery evidence is required for reason \"{reason}\"")]
    EvidenceRequired {
        /// The reason code.
        reason: String,
    },

    /// Delivery evidence does not describe the escrow's transaction kind.
    #[error("{evidence} evidence does not apply to a {kind} escrow")]
    EvidenceMismatch {
        /// The escrow's transaction kind.
        kind: String,
        /// The kind of evidence supplied.
        evidence: String,
    },

    /// No refund request with this identifier exists.
    #[error("refund request {0} not found")]
    RequestNotFound(String),

    /// The request's status does not permit the operation.
    #[error("refund request {request_id} cannot {operation} in status {status}")]
    InvalidRequestState {
        /// The request identifier.
        request_id: String,
        /// The attempted operation.
        operation: String,
        /// Current status.
        status: String,
    },

    /// The escrow ledger rejected the settlement.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A field failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallowed_reason_display() {
        let err = RefundError::DisallowedReason("changed_mind".to_string());
        assert!(format!("{err}").contains("changed_mind"));
    }

    #[test]
    fn ledger_errors_pass_through() {
        let err: RefundError = LedgerError::EscrowNotFound("escrow:x".to_string()).into();
        assert_eq!(format!("{err}"), "escrow escrow:x not found");
    }

    #[test]
    fn invalid_request_state_display() {
        let err = RefundError::InvalidRequestState {
            request_id: "r-1".to_string(),
            operation: "review".to_string(),
            status: "AWAITING_HUMAN".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("review"));
        assert!(msg.contains("AWAITING_HUMAN"));
    }
}
