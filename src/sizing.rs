use crate::models::*;

/// Provider count shown when no targeting has been applied.
pub const BASE_PROVIDER_COUNT: u64 = 4500;

/// Patients reached per targeted provider.
pub const REACH_PER_PROVIDER: u64 = 250;

pub struct AudienceSizer;

impl AudienceSizer {
    /// Estimate audience size from a filter snapshot.
    ///
    /// Multipliers are applied in a fixed order with the running count
    /// floored after every step; reordering them changes the result.
    pub fn size(filters: &FilterModel) -> AudienceSizeResult {
        if filters.is_unset() {
            return Self::result_for(BASE_PROVIDER_COUNT);
        }

        let mut count = BASE_PROVIDER_COUNT;

        if let Some(factor) = Self::medication_factor(filters) {
            count = Self::apply(count, factor);
        }
        if let Some(factor) = Self::specialty_factor(filters.specialties.len()) {
            count = Self::apply(count, factor);
        }
        if let Some(factor) = Self::region_factor(filters.regions.len()) {
            count = Self::apply(count, factor);
        }
        count = Self::apply(count, Self::volume_factor(filters.prescribing_volume));
        if let Some(factor) = Self::exclusion_factor(filters.excluded_medications.len()) {
            count = Self::apply(count, factor);
        }

        log::debug!("Sized audience at {} providers", count);
        Self::result_for(count)
    }

    fn result_for(provider_count: u64) -> AudienceSizeResult {
        AudienceSizeResult {
            provider_count,
            potential_reach: provider_count * REACH_PER_PROVIDER,
        }
    }

    fn apply(count: u64, factor: f64) -> u64 {
        (count as f64 * factor).floor().max(0.0) as u64
    }

    fn medication_factor(filters: &FilterModel) -> Option<f64> {
        if !filters.medications.is_empty() {
            Some(0.7)
        } else if filters.medication_category.is_some() {
            Some(0.85)
        } else {
            None
        }
    }

    fn specialty_factor(n: usize) -> Option<f64> {
        (n > 0).then(|| 0.4 + 0.1 * n as f64)
    }

    fn region_factor(n: usize) -> Option<f64> {
        (n > 0).then(|| 0.3 + 0.15 * n as f64)
    }

    fn volume_factor(tier: VolumeTier) -> f64 {
        match tier {
            VolumeTier::High => 0.3,
            VolumeTier::Medium => 0.5,
            VolumeTier::Low => 0.7,
            VolumeTier::All => 1.0,
        }
    }

    /// Clamped at zero: fourteen or more exclusions would otherwise go negative.
    fn exclusion_factor(n: usize) -> Option<f64> {
        (n > 0).then(|| (0.7 - 0.05 * n as f64).max(0.0))
    }
}
