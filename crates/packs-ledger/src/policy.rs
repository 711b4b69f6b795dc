//! Per-kind escrow time windows.

use chrono::Duration;
use packs_core::ValidationError;
use serde::{Deserialize, Serialize};

use crate::escrow::TransactionKind;

/// Refund window and auto-release delay for one transaction kind, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindWindows {
    /// Hours after opening during which the payer may request a refund.
    pub refund_window_hours: i64,
    /// Hours after opening at which the sweep releases a HELD escrow.
    pub auto_release_after_hours: i64,
}

impl KindWindows {
    const fn new(refund_window_hours: i64, auto_release_after_hours: i64) -> Self {
        Self {
            refund_window_hours,
            auto_release_after_hours,
        }
    }

    /// Refund window as a duration.
    pub fn refund_window(&self) -> Duration {
        Duration::hours(self.refund_window_hours)
    }

    /// Auto-release delay as a duration, never shorter than the refund window.
    pub fn auto_release_after(&self) -> Duration {
        Duration::hours(self.auto_release_after_hours.max(self.refund_window_hours))
    }
}

/// Escrow windows for every transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowPolicy {
    /// Paid chat messages.
    pub chat: KindWindows,
    /// Calls.
    pub call: KindWindows,
    /// Event tickets.
    pub event: KindWindows,
    /// Unlockable content.
    pub content: KindWindows,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            chat: KindWindows::new(48, 72),
            call: KindWindows::new(24, 48),
            event: KindWindows::new(72, 168),
            content: KindWindows::new(24, 48),
        }
    }
}

impl EscrowPolicy {
    /// Windows for `kind`.
    pub fn windows(&self, kind: TransactionKind) -> KindWindows {
        match kind {
            TransactionKind::Chat => self.chat,
            TransactionKind::Call => self.call,
            TransactionKind::Event => self.event,
            TransactionKind::Content => self.content,
        }
    }

    /// Reject non-positive windows and auto-release before the refund window closes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for kind in TransactionKind::ALL {
            let w = self.windows(kind);
            if w.refund_window_hours <= 0 {
                return Err(ValidationError::InvalidSetting {
                    field: "escrow.refund_window_hours",
                    reason: format!("{kind}: must be positive, got {}", w.refund_window_hours),
                });
            }
            if w.auto_release_after_hours < w.refund_window_hours {
                return Err(ValidationError::InvalidSetting {
                    field: "escrow.auto_release_after_hours",
                    reason: format!(
                        "{kind}: {} is earlier than the refund window ({})",
                        w.auto_release_after_hours, w.refund_window_hours
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EscrowPolicy::default().validate().unwrap();
    }

    #[test]
    fn auto_release_before_window_rejected() {
        let mut p = EscrowPolicy::default();
        p.call = KindWindows::new(24, 12);
        let err = p.validate().unwrap_err();
        assert!(format!("{err}").contains("call"));
    }

    #[test]
    fn auto_release_never_precedes_window() {
        let w = KindWindows::new(24, 12);
        assert_eq!(w.auto_release_after(), Duration::hours(24));
    }

    #[test]
    fn partial_policy_uses_defaults() {
        let p: EscrowPolicy = serde_json::from_str(
            r#"{"chat": {"refund_window_hours": 1, "auto_release_after_hours": 2}}"#,
        )
        .unwrap();
        assert_eq!(p.chat.refund_window_hours, 1);
        assert_eq!(p.event, EscrowPolicy::default().event);
    }
}
