use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::push::{DeliveryLogEntry, DeliveryStatus};

/// Counts over the delivery log, keyed by status, kind and tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
    pub by_tier: BTreeMap<&'static str, usize>,
}

impl DeliveryStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DeliveryLogEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total += 1;
            match entry.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
            *stats.by_kind.entry(entry.kind.as_str()).or_default() += 1;
            *stats.by_tier.entry(entry.metadata.tier.as_str()).or_default() += 1;
        }
        stats
    }

    /// Share of finished entries that were sent, `None` before anything finished.
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.sent + self.failed;
        if finished == 0 {
            return None;
        }
        Some(self.sent as f64 / finished as f64)
    }
}

/// Newest first, optionally limited to one recipient.
pub fn recent_entries(
    mut entries: Vec<DeliveryLogEntry>,
    recipient_id: Option<&str>,
    limit: usize,
) -> Vec<DeliveryLogEntry> {
    if let Some(recipient_id) = recipient_id {
        entries.retain(|entry| entry.recipient_id == recipient_id);
    }
    entries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    entries.truncate(limit);
    entries
}
