use chrono::{DateTime, Utc};

use crate::models::{Escalation, Trade};
use crate::store::{StoreError, StoreTx};

/// Substrings of a remote status that mean the counterparty raised a dispute.
const DISPUTE_MARKERS: &[&str] = &["dispute", "appeal"];

/// Substrings that mark a dispute as already settled.
const SETTLED_MARKERS: &[&str] = &["closed", "resolved", "cancel", "complete", "released"];

/// True when the platform's raw status reports a dispute that is still open.
pub fn is_dispute(trade_status: Option<&str>) -> bool {
    let Some(status) = trade_status.map(str::to_lowercase) else {
        return false;
    };
    DISPUTE_MARKERS.iter().any(|m| status.contains(m))
        && !SETTLED_MARKERS.iter().any(|m| status.contains(m))
}

/// Ensure exactly one PENDING escalation exists for a disputed trade.
///
/// Returns the escalation created by this call, or `None` when the trade is
/// not disputed or was already escalated. Runs inside the caller's
/// transaction so the check and insert commit together.
pub async fn ensure_escalation(
    tx: &mut dyn StoreTx,
    trade: &Trade,
    now: DateTime<Utc>,
) -> Result<Option<Escalation>, StoreError> {
    if !is_dispute(trade.trade_status.as_deref()) {
        return Ok(None);
    }

    if tx.find_escalation_for_trade(trade.id).await?.is_some() {
        tracing::debug!(trade_hash = %trade.trade_hash, "Dispute already escalated");
        return Ok(None);
    }

    let reason = format!(
        "Remote status '{}'",
        trade.trade_status.as_deref().unwrap_or_default()
    );
    let escalation = Escalation::for_trade(trade, reason, now);
    tx.insert_escalation(&escalation).await?;

    tracing::warn!(
        trade_hash = %trade.trade_hash,
        platform = %trade.platform,
        amount = ?trade.amount,
        "Dispute escalated"
    );

    Ok(Some(escalation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispute_markers() {
        assert!(is_dispute(Some("Dispute open")));
        assert!(is_dispute(Some("DISPUTED")));
        assert!(is_dispute(Some("IN_APPEAL")));
        assert!(is_dispute(Some("appealing")));
        assert!(!is_dispute(Some("Paid")));
        assert!(!is_dispute(Some("Active funded")));
        assert!(!is_dispute(None));
        assert!(!is_dispute(Some("Dispute closed")));
        assert!(!is_dispute(Some("Dispute resolved")));
        assert!(!is_dispute(Some("APPEAL_CANCELLED")));
    }
}
