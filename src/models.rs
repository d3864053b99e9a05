use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

// ── Reference data ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub region_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub medications: Vec<Medication>,
    pub specialties: Vec<Specialty>,
    pub regions: Vec<Region>,
}

// ── Targeting filters ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTier {
    #[default]
    All,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    LastMonth,
    LastQuarter,
    LastYear,
}

/// Targeting specification an operator builds up field by field.
///
/// Included and excluded medication sets are expected to be disjoint; the
/// type does not enforce it (see `FilterModel::overlapping_medications`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterModel {
    pub medication_category: Option<String>,
    pub medications: BTreeSet<String>,
    pub excluded_medications: BTreeSet<String>,
    pub specialties: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub prescribing_volume: VolumeTier,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    MedicationCategory,
    Medications,
    ExcludedMedications,
    Specialties,
    Regions,
    PrescribingVolume,
    Timeframe,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceSizeResult {
    pub provider_count: u64,
    pub potential_reach: u64,
}

// ── Identity matching ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    #[default]
    NotStarted,
    Parsing,
    Matching,
    Analyzing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched_providers: u64,
    pub total_providers: u64,
    pub match_percentage: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMatchState {
    pub stage: MatchStage,
    pub progress: u8,
    pub operation: Option<String>,
    /// Only populated once `stage` is `Complete`.
    pub result: Option<MatchResult>,
}

impl IdentityMatchState {
    pub fn not_started() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.stage == MatchStage::Complete
    }
}

/// Wall-clock pacing of the identity match stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTiming {
    pub parsing: Duration,
    pub matching: Duration,
    pub analyzing: Duration,
    pub completion_hold: Duration,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            parsing: Duration::from_millis(2000),
            matching: Duration::from_millis(2500),
            analyzing: Duration::from_millis(2500),
            completion_hold: Duration::from_millis(1000),
        }
    }
}

// ── Script lift ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationLiftEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub baseline_prescriptions: f64,
    pub lift_percentage: f64,
    pub is_targeted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_competitor: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedLabel {
    pub name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignImpact {
    pub overall_lift_percentage: f64,
    #[serde(rename = "estimatedROI")]
    pub estimated_roi: f64,
    pub market_share_change: f64,
    pub time_to_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLiftConfig {
    pub campaign_id: String,
    pub campaign_name: String,
    pub medications: Vec<MedicationLiftEntry>,
    pub specialties: Vec<WeightedLabel>,
    pub regions: Vec<WeightedLabel>,
    pub campaign_impact: CampaignImpact,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScriptLiftConfig {
    pub fn target(&self) -> Option<&MedicationLiftEntry> {
        self.medications.iter().find(|m| m.is_targeted)
    }
}

/// Which medications the target is benchmarked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "ids")]
pub enum ComparisonMode {
    #[default]
    WholeClass,
    SpecificIds(BTreeSet<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeTotals {
    pub baseline: f64,
    /// Rounded to the nearest integer at the aggregate.
    pub projected: f64,
    pub change: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiftTotals {
    pub target: VolumeTotals,
    pub comparison: VolumeTotals,
}

/// Lift constants used by the projector and the default-config generator.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftDefaults {
    pub target_lift: f64,
    pub comparison_lift: f64,
    pub generated_target_lift: f64,
    pub generated_class_lift: f64,
    pub generated_competitor_lift: f64,
    pub class_baseline_range: (u32, u32),
    pub competitor_baseline_range: (u32, u32),
    pub weight_buckets: Vec<f64>,
    pub estimated_roi: f64,
    pub time_to_impact: String,
}

impl Default for LiftDefaults {
    fn default() -> Self {
        Self {
            target_lift: 25.0,
            comparison_lift: -5.0,
            generated_target_lift: 35.0,
            generated_class_lift: 15.0,
            generated_competitor_lift: -8.0,
            class_baseline_range: (200, 500),
            competitor_baseline_range: (300, 700),
            weight_buckets: vec![30.0, 25.0, 20.0, 15.0, 10.0],
            estimated_roi: 3.2,
            time_to_impact: "3-6 months".to_string(),
        }
    }
}

// ── Audience comparison ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub name: String,
    pub provider_count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDatum {
    pub region: String,
    pub provider_count: u64,
    pub potential_reach: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceConfig {
    pub id: String,
    pub name: String,
    pub filters: FilterModel,
    pub provider_count: u64,
    pub potential_reach: u64,
    pub segments: Vec<Segment>,
    pub region_data: Vec<RegionDatum>,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDifference {
    pub label: String,
    pub primary: f64,
    pub secondary: f64,
    pub difference: f64,
    pub percent_change: f64,
    pub is_positive: bool,
}

// ── Campaign records ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_medication_id: Option<String>,
    pub target_specialty: Option<String>,
    pub target_geographic_area: Option<String>,
    pub targeting_metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_medication_id: Option<String>,
    pub target_specialty: Option<String>,
    pub target_geographic_area: Option<String>,
    pub targeting_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Partial update. `None` leaves a field alone; for the optional targets
/// `Some(None)` clears the stored value (`null` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub target_medication_id: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub target_specialty: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub target_geographic_area: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targeting_metadata: Option<serde_json::Value>,
}

/// A present key, even `null`, becomes `Some`; a missing key stays `None`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
