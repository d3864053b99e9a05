use crate::{errors::TargetingError, models::*, Result};
use chrono::Utc;
use rand::Rng;

pub const COMPETITOR_CATEGORY: &str = "competitors";

const DEFAULT_SPECIALTIES: [&str; 5] = [
    "Primary Care",
    "Cardiology",
    "Endocrinology",
    "Internal Medicine",
    "Other",
];

const DEFAULT_REGIONS: [&str; 5] = ["Northeast", "Southeast", "Midwest", "Southwest", "West"];

/// Optional inputs to `LiftProjector::generate_default`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultConfigRequest {
    pub target_medication_id: Option<String>,
    pub target_category: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
}

/// Owns one campaign's lift table and keeps the single-target invariant.
#[derive(Debug, Clone)]
pub struct LiftProjector {
    config: ScriptLiftConfig,
    mode: ComparisonMode,
    defaults: LiftDefaults,
}

impl LiftProjector {
    pub fn new(config: ScriptLiftConfig) -> Self {
        Self::with_defaults(config, LiftDefaults::default())
    }

    pub fn with_defaults(config: ScriptLiftConfig, defaults: LiftDefaults) -> Self {
        Self {
            config,
            mode: ComparisonMode::WholeClass,
            defaults,
        }
    }

    pub fn config(&self) -> &ScriptLiftConfig {
        &self.config
    }

    pub fn into_config(self) -> ScriptLiftConfig {
        self.config
    }

    pub fn mode(&self) -> &ComparisonMode {
        &self.mode
    }

    /// Make `medication_id` the only targeted entry.
    ///
    /// Every other entry is reset to no lift unless the active comparison
    /// mode selects it.
    pub fn set_target(&mut self, medication_id: &str) -> Result<()> {
        if !self.config.medications.iter().any(|m| m.id == medication_id) {
            return Err(TargetingError::Validation(format!(
                "Medication {} is not part of campaign {}",
                medication_id, self.config.campaign_id
            )));
        }

        for entry in self.config.medications.iter_mut() {
            if entry.id == medication_id {
                entry.is_targeted = true;
                entry.lift_percentage = self.defaults.target_lift;
            } else {
                entry.is_targeted = false;
                entry.lift_percentage = 0.0;
            }
        }
        self.apply_comparisons();
        self.touch();

        log::debug!(
            "Campaign {} now targets {}",
            self.config.campaign_id,
            medication_id
        );
        Ok(())
    }

    pub fn set_comparison_mode(&mut self, mode: ComparisonMode) {
        let previous: Vec<String> = Self::comparison_set(&self.config, &self.mode)
            .map(|entry| entry.id.clone())
            .collect();

        self.mode = mode;
        for entry in self.config.medications.iter_mut() {
            if previous.contains(&entry.id) {
                entry.lift_percentage = 0.0;
            }
        }
        self.apply_comparisons();
        self.touch();
    }

    pub fn totals(&self) -> LiftTotals {
        Self::totals_for(&self.config, &self.mode)
    }

    fn apply_comparisons(&mut self) {
        let target_category = self.config.target().map(|t| t.category.clone());
        let comparison_lift = self.defaults.comparison_lift;

        for entry in self.config.medications.iter_mut().filter(|m| !m.is_targeted) {
            let in_class = target_category.as_deref() == Some(entry.category.as_str());
            match &self.mode {
                ComparisonMode::WholeClass => {
                    if in_class {
                        entry.lift_percentage = comparison_lift;
                    }
                }
                ComparisonMode::SpecificIds(ids) => {
                    if ids.contains(&entry.id) {
                        entry.lift_percentage = comparison_lift;
                    } else if in_class {
                        entry.lift_percentage = 0.0;
                    }
                }
            }
        }
    }

    /// Stamp the edit and bring the impact estimate in line with the lifts.
    fn touch(&mut self) {
        self.config.campaign_impact = Self::estimate_impact(&self.config.medications, &self.defaults);
        self.config.last_modified = Utc::now();
    }

    /// Non-target entries benchmarked against the target under `mode`.
    pub fn comparison_set<'a>(
        config: &'a ScriptLiftConfig,
        mode: &'a ComparisonMode,
    ) -> impl Iterator<Item = &'a MedicationLiftEntry> + 'a {
        let target_category = config.target().map(|t| t.category.as_str());
        config
            .medications
            .iter()
            .filter(|entry| !entry.is_targeted)
            .filter(move |entry| match mode {
                ComparisonMode::WholeClass => target_category == Some(entry.category.as_str()),
                ComparisonMode::SpecificIds(ids) => ids.contains(&entry.id),
            })
    }

    pub fn projected_volume(entry: &MedicationLiftEntry) -> f64 {
        entry.baseline_prescriptions * (1.0 + entry.lift_percentage / 100.0)
    }

    /// Target and comparison aggregates. Projected sums are rounded only at
    /// the aggregate level.
    pub fn totals_for(config: &ScriptLiftConfig, mode: &ComparisonMode) -> LiftTotals {
        LiftTotals {
            target: Self::aggregate(config.target().into_iter()),
            comparison: Self::aggregate(Self::comparison_set(config, mode)),
        }
    }

    fn aggregate<'a>(entries: impl Iterator<Item = &'a MedicationLiftEntry>) -> VolumeTotals {
        let (baseline, projected) = entries.fold((0.0, 0.0), |(base, proj), entry| {
            (
                base + entry.baseline_prescriptions,
                proj + Self::projected_volume(entry),
            )
        });
        let projected = projected.round();
        let change = projected - baseline;

        VolumeTotals {
            baseline,
            projected,
            change,
            percent_change: percent_of(change, baseline),
        }
    }

    /// Build a fresh configuration for a campaign.
    ///
    /// The target is resolved by id, else as the first medication in
    /// `target_category`. Every medication in the resolved class and every
    /// competitor gets a random baseline from `rng`.
    pub fn generate_default<R: Rng + ?Sized>(
        campaign_id: &str,
        campaign_name: &str,
        all_medications: &[Medication],
        request: &DefaultConfigRequest,
        defaults: &LiftDefaults,
        rng: &mut R,
    ) -> ScriptLiftConfig {
        let target = request
            .target_medication_id
            .as_deref()
            .and_then(|id| all_medications.iter().find(|m| m.id == id))
            .or_else(|| {
                request
                    .target_category
                    .as_deref()
                    .and_then(|category| all_medications.iter().find(|m| m.category == category))
            });
        let category = target
            .map(|m| m.category.as_str())
            .or(request.target_category.as_deref());

        let mut medications = Vec::new();
        for medication in all_medications {
            if Some(medication.category.as_str()) == category {
                let is_targeted = target.map_or(false, |t| t.id == medication.id);
                let (low, high) = defaults.class_baseline_range;
                medications.push(MedicationLiftEntry {
                    id: medication.id.clone(),
                    name: medication.name.clone(),
                    category: medication.category.clone(),
                    baseline_prescriptions: rng.gen_range(low..high) as f64,
                    lift_percentage: if is_targeted {
                        defaults.generated_target_lift
                    } else {
                        defaults.generated_class_lift
                    },
                    is_targeted,
                    is_competitor: None,
                });
            } else if medication.category == COMPETITOR_CATEGORY {
                let (low, high) = defaults.competitor_baseline_range;
                medications.push(MedicationLiftEntry {
                    id: medication.id.clone(),
                    name: medication.name.clone(),
                    category: medication.category.clone(),
                    baseline_prescriptions: rng.gen_range(low..high) as f64,
                    lift_percentage: defaults.generated_competitor_lift,
                    is_targeted: false,
                    is_competitor: Some(true),
                });
            }
        }

        let campaign_impact = Self::estimate_impact(&medications, defaults);
        let now = Utc::now();

        log::info!(
            "Generated default lift configuration for campaign {} ({} medications, target {:?})",
            campaign_id,
            medications.len(),
            target.map(|t| t.id.as_str())
        );

        ScriptLiftConfig {
            campaign_id: campaign_id.to_string(),
            campaign_name: campaign_name.to_string(),
            medications,
            specialties: weighted_labels(
                request.specialties.as_deref(),
                &DEFAULT_SPECIALTIES,
                &defaults.weight_buckets,
            ),
            regions: weighted_labels(
                request.regions.as_deref(),
                &DEFAULT_REGIONS,
                &defaults.weight_buckets,
            ),
            campaign_impact,
            created_at: now,
            last_modified: now,
            notes: None,
        }
    }

    fn estimate_impact(medications: &[MedicationLiftEntry], defaults: &LiftDefaults) -> CampaignImpact {
        if medications.is_empty() {
            return CampaignImpact::default();
        }

        let class: Vec<&MedicationLiftEntry> = medications
            .iter()
            .filter(|m| m.is_competitor != Some(true))
            .collect();
        let class_baseline: f64 = class.iter().map(|m| m.baseline_prescriptions).sum();
        let weighted_lift: f64 = class
            .iter()
            .map(|m| m.baseline_prescriptions * m.lift_percentage)
            .sum();

        let total_baseline: f64 = medications.iter().map(|m| m.baseline_prescriptions).sum();
        let total_projected: f64 = medications.iter().map(Self::projected_volume).sum();
        let market_share_change = medications
            .iter()
            .find(|m| m.is_targeted)
            .map_or(0.0, |target| {
                percent_of(Self::projected_volume(target), total_projected)
                    - percent_of(target.baseline_prescriptions, total_baseline)
            });

        CampaignImpact {
            overall_lift_percentage: round_to_tenth(if class_baseline > 0.0 {
                weighted_lift / class_baseline
            } else {
                0.0
            }),
            estimated_roi: defaults.estimated_roi,
            market_share_change: round_to_tenth(market_share_change),
            time_to_impact: defaults.time_to_impact.clone(),
        }
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn weighted_labels(names: Option<&[String]>, fallback: &[&str], buckets: &[f64]) -> Vec<WeightedLabel> {
    match names {
        Some(names) if !names.is_empty() => names
            .iter()
            .zip(buckets)
            .map(|(name, percentage)| WeightedLabel {
                name: name.clone(),
                percentage: *percentage,
            })
            .collect(),
        _ => fallback
            .iter()
            .zip(buckets)
            .map(|(name, percentage)| WeightedLabel {
                name: name.to_string(),
                percentage: *percentage,
            })
            .collect(),
    }
}
