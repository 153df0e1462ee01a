use tracing::debug;

use merits_core::{
    CanonicalDataset, ConflictEntry, ConflictLog, DimensionField, KeptSide, MetricField,
    NormalizedRecord,
};

use crate::config::{ConflictConfig, DimensionPolicy, NumericPolicy};

/// Merge normalized records into the dataset, one at a time in input order.
/// New keys insert; colliding keys resolve field by field in canonical order
/// (metrics, then dimensions), and every resolved disagreement lands in the
/// returned log. A present value against an absent one fills in silently —
/// absence is missing information, not a competing claim.
pub fn merge(
    dataset: &mut CanonicalDataset,
    records: impl IntoIterator<Item = NormalizedRecord>,
    policy: &ConflictConfig,
) -> ConflictLog {
    let mut log = ConflictLog::new();

    for incoming in records {
        let key = incoming.key();
        let Some(existing) = dataset.get_mut(&key) else {
            dataset.insert(incoming);
            continue;
        };

        for field in MetricField::ALL {
            match (existing.metric(field), incoming.metric(field)) {
                (None, Some(v)) => existing.set_metric(field, Some(v)),
                (Some(a), Some(b)) if a != b => {
                    let kept = match policy.numeric {
                        NumericPolicy::LargerWins => {
                            if b > a {
                                KeptSide::Incoming
                            } else {
                                KeptSide::Existing
                            }
                        }
                        NumericPolicy::FirstWins => KeptSide::Existing,
                        NumericPolicy::LastWins => KeptSide::Incoming,
                    };
                    log.push(ConflictEntry {
                        entity_id: key.entity_id.clone(),
                        date: key.date,
                        field: field.name().to_string(),
                        existing: a.to_string(),
                        incoming: b.to_string(),
                        kept,
                    });
                    if kept == KeptSide::Incoming {
                        existing.set_metric(field, Some(b));
                    }
                }
                _ => {}
            }
        }

        for field in DimensionField::ALL {
            match (existing.dimension(field), incoming.dimension(field)) {
                (None, Some(v)) => existing.set_dimension(field, Some(v.to_string())),
                (Some(a), Some(b)) if a != b => {
                    let kept = match policy.dimension {
                        DimensionPolicy::FirstWins => KeptSide::Existing,
                        DimensionPolicy::LastWins => KeptSide::Incoming,
                    };
                    log.push(ConflictEntry {
                        entity_id: key.entity_id.clone(),
                        date: key.date,
                        field: field.name().to_string(),
                        existing: a.to_string(),
                        incoming: b.to_string(),
                        kept,
                    });
                    if kept == KeptSide::Incoming {
                        existing.set_dimension(field, Some(b.to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    debug!(records = dataset.len(), conflicts = log.len(), "merge complete");
    log
}
