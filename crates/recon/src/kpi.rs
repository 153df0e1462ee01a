use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use merits_core::{CanonicalDataset, DimensionField, MetricField, NormalizedRecord};

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Per-metric sums. Absent values count as zero for summation only; the
/// absent/zero distinction lives in the records, not the totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricTotals {
    pub impressions: u64,
    pub engagements: u64,
    pub clicks: u64,
    pub leads: u64,
}

impl MetricTotals {
    /// Saturating: totals clamp at `u64::MAX` rather than wrapping or
    /// panicking on pathological inputs.
    fn add(&mut self, record: &NormalizedRecord) {
        self.impressions = self.impressions.saturating_add(record.impressions.unwrap_or(0));
        self.engagements = self.engagements.saturating_add(record.engagements.unwrap_or(0));
        self.clicks = self.clicks.saturating_add(record.clicks.unwrap_or(0));
        self.leads = self.leads.saturating_add(record.leads.unwrap_or(0));
    }

    pub fn get(&self, field: MetricField) -> u64 {
        match field {
            MetricField::Impressions => self.impressions,
            MetricField::Engagements => self.engagements,
            MetricField::Clicks => self.clicks,
            MetricField::Leads => self.leads,
        }
    }
}

/// Derived rates as plain ratios. `None` means undefined (denominator total
/// is zero) and serializes as `null` — distinct from an actual 0.0 rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub engagement_rate: Option<f64>,
    pub click_through_rate: Option<f64>,
    pub lead_conversion_rate: Option<f64>,
}

impl Rates {
    fn from_totals(totals: &MetricTotals) -> Self {
        Self {
            engagement_rate: ratio(totals.engagements, totals.impressions),
            click_through_rate: ratio(totals.clicks, totals.impressions),
            lead_conversion_rate: ratio(totals.leads, totals.clicks),
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// One breakdown bucket. `value: None` collects records lacking the
/// breakdown dimension so bucket totals still reconcile with the overall
/// totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub value: Option<String>,
    pub records: usize,
    pub totals: MetricTotals,
    pub rates: Rates,
}

/// The full KPI result for one (dataset, filter, breakdown) triple.
/// Regenerated per call; never updated incrementally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub records: usize,
    pub totals: MetricTotals,
    pub rates: Rates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<BreakdownRow>>,
}

/// Metric totals for one calendar date, for time-series charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: MetricTotals,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Record predicate: inclusive date range plus exact-match dimension
/// constraints. The default filter selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub campaign: Option<String>,
    pub content_type: Option<String>,
}

impl DatasetFilter {
    pub fn includes(&self, record: &NormalizedRecord) -> bool {
        if self.from.is_some_and(|from| record.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.date > to) {
            return false;
        }
        if let Some(ref campaign) = self.campaign {
            if record.campaign.as_deref() != Some(campaign.as_str()) {
                return false;
            }
        }
        if let Some(ref content_type) = self.content_type {
            if record.content_type.as_deref() != Some(content_type.as_str()) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute totals and rates over the filtered dataset, with an optional
/// per-dimension breakdown. Pure function of its inputs; safe to call
/// repeatedly and cache.
pub fn compute_kpis(
    dataset: &CanonicalDataset,
    filter: &DatasetFilter,
    breakdown: Option<DimensionField>,
) -> KpiSummary {
    let mut records = 0usize;
    let mut totals = MetricTotals::default();
    let mut buckets: BTreeMap<Option<String>, (usize, MetricTotals)> = BTreeMap::new();

    for record in dataset.records().filter(|r| filter.includes(r)) {
        records += 1;
        totals.add(record);
        if let Some(field) = breakdown {
            let value = record.dimension(field).map(str::to_string);
            let entry = buckets.entry(value).or_default();
            entry.0 += 1;
            entry.1.add(record);
        }
    }

    let breakdown = breakdown.map(|_| {
        let mut rows: Vec<BreakdownRow> = buckets
            .into_iter()
            .map(|(value, (records, totals))| BreakdownRow {
                value,
                records,
                totals,
                rates: Rates::from_totals(&totals),
            })
            .collect();
        // Descending impressions; ties break lexicographically ascending,
        // with the absent-dimension bucket after any named value.
        rows.sort_by(|a, b| {
            b.totals
                .impressions
                .cmp(&a.totals.impressions)
                .then_with(|| match (&a.value, &b.value) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });
        rows
    });

    KpiSummary {
        records,
        totals,
        rates: Rates::from_totals(&totals),
        breakdown,
    }
}

/// Per-date metric totals in ascending date order, over the filtered
/// dataset.
pub fn daily_series(dataset: &CanonicalDataset, filter: &DatasetFilter) -> Vec<DailyTotals> {
    let mut days: BTreeMap<NaiveDate, MetricTotals> = BTreeMap::new();
    for record in dataset.records().filter(|r| filter.includes(r)) {
        days.entry(record.date).or_default().add(record);
    }
    days.into_iter()
        .map(|(date, totals)| DailyTotals { date, totals })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
