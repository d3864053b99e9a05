use crate::models::*;
use crate::sizing::{AudienceSizer, REACH_PER_PROVIDER};
use chrono::Utc;

type MetricFn = fn(&AudienceConfig) -> f64;

/// Metrics compared between two audiences, in display order.
const TRACKED_METRICS: [(&str, MetricFn); 2] = [
    ("Provider Count", provider_count),
    ("Potential Reach", potential_reach),
];

fn provider_count(audience: &AudienceConfig) -> f64 {
    audience.provider_count as f64
}

fn potential_reach(audience: &AudienceConfig) -> f64 {
    audience.potential_reach as f64
}

pub struct AudienceComparator;

impl AudienceComparator {
    /// Labeled deltas of `primary` against `modified`.
    pub fn diff(primary: &AudienceConfig, modified: &AudienceConfig) -> Vec<MetricDifference> {
        TRACKED_METRICS
            .iter()
            .map(|(label, metric)| Self::difference(label, metric(primary), metric(modified)))
            .collect()
    }

    pub fn difference(label: &str, primary: f64, secondary: f64) -> MetricDifference {
        let difference = primary - secondary;
        let percent_change = if secondary == 0.0 {
            0.0
        } else {
            difference / secondary * 100.0
        };

        MetricDifference {
            label: label.to_string(),
            primary,
            secondary,
            difference,
            percent_change: if percent_change.is_finite() { percent_change } else { 0.0 },
            is_positive: primary > secondary,
        }
    }
}

impl AudienceConfig {
    /// Sized audience for `filters` with its segment and region breakdown.
    pub fn from_filters(id: &str, name: &str, filters: FilterModel) -> Self {
        let mut audience = AudienceConfig {
            id: id.to_string(),
            name: name.to_string(),
            filters,
            provider_count: 0,
            potential_reach: 0,
            segments: Vec::new(),
            region_data: Vec::new(),
            date_created: Utc::now(),
        };
        audience.resize();
        audience
    }

    /// Recompute counts and breakdowns from the current filters.
    pub fn resize(&mut self) {
        let size = AudienceSizer::size(&self.filters);
        self.provider_count = size.provider_count;
        self.potential_reach = size.potential_reach;
        self.segments = segments_for(&self.filters, size.provider_count);
        self.region_data = regions_for(&self.filters, size.provider_count);
    }
}

fn split_evenly(total: u64, parts: usize) -> Vec<u64> {
    let parts = parts.max(1) as u64;
    let share = total / parts;
    let remainder = total % parts;
    (0..parts)
        .map(|i| share + u64::from(i < remainder))
        .collect()
}

fn segments_for(filters: &FilterModel, provider_count: u64) -> Vec<Segment> {
    if filters.specialties.is_empty() {
        return vec![Segment {
            name: "All Specialties".to_string(),
            provider_count,
            percentage: 100.0,
        }];
    }

    let n = filters.specialties.len();
    filters
        .specialties
        .iter()
        .zip(split_evenly(provider_count, n))
        .map(|(specialty, count)| Segment {
            name: specialty.clone(),
            provider_count: count,
            percentage: 100.0 / n as f64,
        })
        .collect()
}

fn regions_for(filters: &FilterModel, provider_count: u64) -> Vec<RegionDatum> {
    let names: Vec<String> = if filters.regions.is_empty() {
        vec!["National".to_string()]
    } else {
        filters.regions.iter().cloned().collect()
    };

    let shares = split_evenly(provider_count, names.len());
    names
        .into_iter()
        .zip(shares)
        .map(|(region, count)| RegionDatum {
            region,
            provider_count: count,
            potential_reach: count * REACH_PER_PROVIDER,
        })
        .collect()
}

/// A primary audience and an independently editable copy of it.
#[derive(Debug, Clone)]
pub struct ComparisonSession {
    primary: AudienceConfig,
    modified: AudienceConfig,
}

impl ComparisonSession {
    pub fn new(primary: AudienceConfig) -> Self {
        let modified = primary.clone();
        Self { primary, modified }
    }

    /// Compare two existing audiences; either may be edited later.
    pub fn between(primary: AudienceConfig, secondary: AudienceConfig) -> Self {
        Self {
            primary,
            modified: secondary,
        }
    }

    pub fn primary(&self) -> &AudienceConfig {
        &self.primary
    }

    pub fn modified(&self) -> &AudienceConfig {
        &self.modified
    }

    pub fn update_filters(&mut self, filters: FilterModel) {
        let changed = self.modified.filters.diff(&filters);
        if changed.is_empty() {
            return;
        }
        log::debug!("Audience {} edited: {:?}", self.modified.id, changed);
        self.modified.filters = filters;
        self.modified.resize();
    }

    pub fn rename_modified(&mut self, name: &str) {
        self.modified.name = name.to_string();
    }

    /// Discard every edit and start again from a fresh copy of the primary.
    pub fn reset(&mut self) {
        self.modified = self.primary.clone();
    }

    pub fn differences(&self) -> Vec<MetricDifference> {
        AudienceComparator::diff(&self.primary, &self.modified)
    }
}
