use crate::{
    errors::TargetingError,
    models::*,
    sizing::AudienceSizer,
    store::{CampaignStore, LiftConfigStore, PrescriptionRegenerator, ReferenceDataProvider},
    Result,
};
use chrono::NaiveDate;
use itertools::Itertools;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Details,
    Targeting,
    IdentityMatch,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::Details,
        WizardStep::Targeting,
        WizardStep::IdentityMatch,
    ];
}

/// Everything an operator has entered while creating a campaign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignDraft {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub filters: FilterModel,
    pub target_medication_id: Option<String>,
    pub target_specialty: Option<String>,
    pub target_geographic_area: Option<String>,
    pub identity_match: IdentityMatchState,
}

pub struct CampaignPlanner;

impl CampaignPlanner {
    /// Check the inputs a single wizard step is responsible for.
    pub fn validate_step(draft: &CampaignDraft, step: WizardStep) -> Result<()> {
        match step {
            WizardStep::Details => Self::validate_details(draft),
            WizardStep::Targeting => Self::validate_targeting(draft),
            WizardStep::IdentityMatch => {
                if draft.identity_match.is_complete() {
                    Ok(())
                } else {
                    Err(TargetingError::Validation(
                        "Identity matching has not completed yet".to_string(),
                    ))
                }
            }
        }
    }

    pub fn validate(draft: &CampaignDraft) -> Result<()> {
        WizardStep::ALL
            .iter()
            .try_for_each(|step| Self::validate_step(draft, *step))
    }

    fn validate_details(draft: &CampaignDraft) -> Result<()> {
        if draft.name.trim().is_empty() {
            return Err(TargetingError::Validation(
                "Campaign name is required".to_string(),
            ));
        }
        let (start, end) = match (draft.start_date, draft.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(TargetingError::Validation(
                    "Campaign start and end dates are required".to_string(),
                ))
            }
        };
        if end < start {
            return Err(TargetingError::Validation(format!(
                "Campaign end date {} is before start date {}",
                end, start
            )));
        }
        Ok(())
    }

    fn validate_targeting(draft: &CampaignDraft) -> Result<()> {
        let filters = &draft.filters;
        let has_scope = filters.medication_category.is_some()
            || !filters.medications.is_empty()
            || draft.target_medication_id.is_some();
        if !has_scope {
            return Err(TargetingError::Validation(
                "Select a medication category or at least one medication".to_string(),
            ));
        }

        let overlap = filters.overlapping_medications();
        if !overlap.is_empty() {
            return Err(TargetingError::Validation(format!(
                "Medications cannot be both included and excluded: {}",
                overlap.iter().join(", ")
            )));
        }
        Ok(())
    }

    /// Validate the draft, confirm every referenced id exists and write the
    /// campaign record. Returns the new campaign id.
    pub fn create_campaign<S, R>(store: &mut S, reference: &R, draft: &CampaignDraft) -> Result<String>
    where
        S: CampaignStore + ?Sized,
        R: ReferenceDataProvider + ?Sized,
    {
        Self::validate(draft)?;
        Self::check_references(reference, draft)?;

        let (start_date, end_date) = match (draft.start_date, draft.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(TargetingError::Validation(
                    "Campaign start and end dates are required".to_string(),
                ))
            }
        };

        let audience = AudienceSizer::size(&draft.filters);
        let mut metadata = draft.filters.to_metadata();
        metadata["audience"] = json!(audience);
        metadata["identity_match"] = json!(draft.identity_match.result);

        let id = store.create(NewCampaign {
            name: draft.name.trim().to_string(),
            start_date,
            end_date,
            target_medication_id: draft.target_medication_id.clone(),
            target_specialty: draft.target_specialty.clone(),
            target_geographic_area: draft.target_geographic_area.clone(),
            targeting_metadata: metadata,
        })?;

        log::info!(
            "Created campaign {} ({}) targeting {} providers",
            id,
            draft.name,
            audience.provider_count
        );
        Ok(id)
    }

    fn check_references<R: ReferenceDataProvider + ?Sized>(
        reference: &R,
        draft: &CampaignDraft,
    ) -> Result<()> {
        let medications = reference.medications()?;
        let specialties = reference.specialties()?;
        let regions = reference.regions()?;

        let unknown_medications: Vec<&String> = draft
            .filters
            .medications
            .iter()
            .chain(draft.filters.excluded_medications.iter())
            .chain(draft.target_medication_id.iter())
            .filter(|id| !medications.iter().any(|m| &m.id == *id))
            .unique()
            .collect();
        if !unknown_medications.is_empty() {
            return Err(TargetingError::Validation(format!(
                "Unknown medications: {}",
                unknown_medications.iter().join(", ")
            )));
        }

        if let Some(unknown) = draft
            .filters
            .specialties
            .iter()
            .find(|id| !specialties.iter().any(|s| &s.id == *id))
        {
            return Err(TargetingError::Validation(format!(
                "Unknown specialty: {}",
                unknown
            )));
        }

        if let Some(unknown) = draft
            .filters
            .regions
            .iter()
            .find(|id| !regions.iter().any(|r| &r.id == *id))
        {
            return Err(TargetingError::Validation(format!("Unknown region: {}", unknown)));
        }

        Ok(())
    }

    /// Persist a lift configuration, then ask for prescription data to be
    /// regenerated. A failing regenerator never fails the save.
    pub fn save_lift_config<S, G>(
        store: &mut S,
        regenerator: &G,
        config: ScriptLiftConfig,
    ) -> Result<ScriptLiftConfig>
    where
        S: LiftConfigStore + ?Sized,
        G: PrescriptionRegenerator + ?Sized,
    {
        let stored = store.put(config)?;
        log::info!(
            "Saved lift configuration for campaign {} ({} medications)",
            stored.campaign_id,
            stored.medications.len()
        );

        if let Err(e) = regenerator.regenerate(&stored.campaign_id) {
            log::warn!(
                "Prescription data regeneration failed for campaign {}: {}",
                stored.campaign_id,
                e
            );
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_data::ExampleDataGenerator;
    use crate::store::{MemoryCampaignStore, MemoryLiftConfigStore, StaticReferenceData};
    use chrono::Utc;
    use std::cell::Cell;

    fn complete_match(total: u64) -> IdentityMatchState {
        IdentityMatchState {
            stage: MatchStage::Complete,
            progress: 100,
            operation: None,
            result: Some(MatchResult::for_total(total)),
        }
    }

    fn valid_draft() -> CampaignDraft {
        CampaignDraft {
            name: "Statin awareness".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 1),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 31),
            filters: FilterModel {
                medication_category: Some("statins".to_string()),
                medications: ["atorvastatin".to_string()].into_iter().collect(),
                specialties: ["cardiology".to_string()].into_iter().collect(),
                prescribing_volume: VolumeTier::High,
                ..FilterModel::default()
            },
            target_medication_id: Some("atorvastatin".to_string()),
            target_specialty: Some("cardiology".to_string()),
            target_geographic_area: None,
            identity_match: complete_match(472),
        }
    }

    fn validation_message(draft: &CampaignDraft) -> String {
        match CampaignPlanner::validate(draft) {
            Err(TargetingError::Validation(message)) => message,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(CampaignPlanner::validate(&valid_draft()).is_ok());
    }

    #[test]
    fn missing_details_are_rejected() {
        let mut draft = valid_draft();
        draft.name = "   ".to_string();
        assert!(validation_message(&draft).contains("name"));

        let mut draft = valid_draft();
        draft.end_date = None;
        assert!(validation_message(&draft).contains("dates"));

        let mut draft = valid_draft();
        draft.end_date = NaiveDate::from_ymd_opt(2026, 10, 1);
        assert!(validation_message(&draft).contains("before"));
    }

    #[test]
    fn targeting_requires_medication_scope() {
        let mut draft = valid_draft();
        draft.filters = FilterModel::default();
        draft.target_medication_id = None;
        assert!(validation_message(&draft).contains("medication"));
    }

    #[test]
    fn overlapping_include_and_exclude_is_rejected() {
        let mut draft = valid_draft();
        draft
            .filters
            .excluded_medications
            .insert("atorvastatin".to_string());
        assert!(validation_message(&draft).contains("atorvastatin"));
    }

    #[test]
    fn incomplete_identity_match_blocks_only_its_step() {
        let mut draft = valid_draft();
        draft.identity_match = IdentityMatchState::not_started();

        assert!(CampaignPlanner::validate_step(&draft, WizardStep::Targeting).is_ok());
        let err = CampaignPlanner::validate_step(&draft, WizardStep::IdentityMatch).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn creates_campaign_with_targeting_metadata() {
        let reference = StaticReferenceData::new(ExampleDataGenerator::reference_data());
        let mut store = MemoryCampaignStore::new();

        let id = CampaignPlanner::create_campaign(&mut store, &reference, &valid_draft()).unwrap();
        let record = store.fetch_by_id(&id).unwrap().unwrap();

        assert_eq!(record.name, "Statin awareness");
        assert_eq!(record.target_medication_id.as_deref(), Some("atorvastatin"));
        assert_eq!(record.targeting_metadata["prescribing_volume"], "high");
        assert_eq!(record.targeting_metadata["audience"]["providerCount"], 472);
        assert_eq!(
            record.targeting_metadata["identity_match"]["matchedProviders"],
            462
        );
    }

    #[test]
    fn unknown_reference_ids_are_rejected() {
        let reference = StaticReferenceData::new(ExampleDataGenerator::reference_data());
        let mut store = MemoryCampaignStore::new();

        let mut draft = valid_draft();
        draft.filters.regions.insert("atlantis".to_string());
        let err = CampaignPlanner::create_campaign(&mut store, &reference, &draft).unwrap_err();
        assert!(err.to_string().contains("atlantis"));
        assert!(store.list().unwrap().is_empty());
    }

    struct FailingReference;

    impl ReferenceDataProvider for FailingReference {
        fn medications(&self) -> Result<Vec<Medication>> {
            Err(TargetingError::Collaborator("reference service unavailable".to_string()))
        }
        fn specialties(&self) -> Result<Vec<Specialty>> {
            Ok(Vec::new())
        }
        fn regions(&self) -> Result<Vec<Region>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn reference_failures_surface_as_collaborator_errors() {
        let mut store = MemoryCampaignStore::new();
        let err = CampaignPlanner::create_campaign(&mut store, &FailingReference, &valid_draft())
            .unwrap_err();
        assert!(matches!(err, TargetingError::Collaborator(ref m) if m.contains("unavailable")));
    }

    struct FlakyRegenerator {
        calls: Cell<usize>,
    }

    impl PrescriptionRegenerator for FlakyRegenerator {
        fn regenerate(&self, _campaign_id: &str) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            Err(TargetingError::Collaborator("regeneration timed out".to_string()))
        }
    }

    #[test]
    fn regenerator_failure_does_not_fail_save() {
        let mut store = MemoryLiftConfigStore::new();
        let regenerator = FlakyRegenerator { calls: Cell::new(0) };
        let now = Utc::now();
        let config = ScriptLiftConfig {
            campaign_id: "campaign-1".to_string(),
            campaign_name: "Statin awareness".to_string(),
            medications: Vec::new(),
            specialties: Vec::new(),
            regions: Vec::new(),
            campaign_impact: CampaignImpact::default(),
            created_at: now,
            last_modified: now,
            notes: None,
        };

        let saved = CampaignPlanner::save_lift_config(&mut store, &regenerator, config).unwrap();
        assert_eq!(saved.campaign_id, "campaign-1");
        assert_eq!(regenerator.calls.get(), 1);
        assert!(store.get("campaign-1").unwrap().is_some());
    }
}
