//! Collaborator contracts the engine persists and reads through, with
//! in-memory and JSON-file implementations.

use crate::{errors::TargetingError, models::*, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait ReferenceDataProvider {
    fn medications(&self) -> Result<Vec<Medication>>;
    fn specialties(&self) -> Result<Vec<Specialty>>;
    fn regions(&self) -> Result<Vec<Region>>;
}

pub trait CampaignStore {
    /// Persist a new campaign and return its id.
    fn create(&mut self, campaign: NewCampaign) -> Result<String>;
    fn fetch_by_id(&self, id: &str) -> Result<Option<CampaignRecord>>;
    fn list(&self) -> Result<Vec<CampaignRecord>>;
    fn update(&mut self, id: &str, patch: CampaignPatch) -> Result<CampaignRecord>;
}

/// One lift configuration per campaign id, last write wins.
pub trait LiftConfigStore {
    fn get(&self, campaign_id: &str) -> Result<Option<ScriptLiftConfig>>;
    /// Upsert, stamping `last_modified`. Returns the stored record.
    fn put(&mut self, config: ScriptLiftConfig) -> Result<ScriptLiftConfig>;
    /// Remove the whole record. Returns whether one existed.
    fn delete(&mut self, campaign_id: &str) -> Result<bool>;
}

pub trait PrescriptionRegenerator {
    fn regenerate(&self, campaign_id: &str) -> Result<()>;
}

// ── Reference data ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StaticReferenceData {
    data: ReferenceData,
}

impl StaticReferenceData {
    pub fn new(data: ReferenceData) -> Self {
        Self { data }
    }
}

impl ReferenceDataProvider for StaticReferenceData {
    fn medications(&self) -> Result<Vec<Medication>> {
        Ok(self.data.medications.clone())
    }

    fn specialties(&self) -> Result<Vec<Specialty>> {
        Ok(self.data.specialties.clone())
    }

    fn regions(&self) -> Result<Vec<Region>> {
        Ok(self.data.regions.clone())
    }
}

// ── Campaigns ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    records: BTreeMap<String, CampaignRecord>,
    next_id: u64,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CampaignStore for MemoryCampaignStore {
    fn create(&mut self, campaign: NewCampaign) -> Result<String> {
        self.next_id += 1;
        let id = format!("campaign-{}", self.next_id);
        let record = CampaignRecord {
            id: id.clone(),
            name: campaign.name,
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            target_medication_id: campaign.target_medication_id,
            target_specialty: campaign.target_specialty,
            target_geographic_area: campaign.target_geographic_area,
            targeting_metadata: campaign.targeting_metadata,
            created_at: Utc::now(),
        };
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<CampaignRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<CampaignRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    fn update(&mut self, id: &str, patch: CampaignPatch) -> Result<CampaignRecord> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| TargetingError::NotFound(format!("campaign {}", id)))?;

        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(start_date) = patch.start_date {
            record.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            record.end_date = end_date;
        }
        if let Some(target_medication_id) = patch.target_medication_id {
            record.target_medication_id = target_medication_id;
        }
        if let Some(target_specialty) = patch.target_specialty {
            record.target_specialty = target_specialty;
        }
        if let Some(target_geographic_area) = patch.target_geographic_area {
            record.target_geographic_area = target_geographic_area;
        }
        if let Some(metadata) = patch.targeting_metadata {
            record.targeting_metadata = metadata;
        }

        Ok(record.clone())
    }
}

// ── Lift configurations ────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryLiftConfigStore {
    configs: BTreeMap<String, ScriptLiftConfig>,
}

impl MemoryLiftConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LiftConfigStore for MemoryLiftConfigStore {
    fn get(&self, campaign_id: &str) -> Result<Option<ScriptLiftConfig>> {
        Ok(self.configs.get(campaign_id).cloned())
    }

    fn put(&mut self, mut config: ScriptLiftConfig) -> Result<ScriptLiftConfig> {
        config.last_modified = Utc::now();
        self.configs
            .insert(config.campaign_id.clone(), config.clone());
        Ok(config)
    }

    fn delete(&mut self, campaign_id: &str) -> Result<bool> {
        Ok(self.configs.remove(campaign_id).is_some())
    }
}

/// Stores each configuration as `<campaign_id>.json` under a directory.
#[derive(Debug, Clone)]
pub struct JsonLiftConfigStore {
    dir: PathBuf,
}

impl JsonLiftConfigStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, campaign_id: &str) -> Result<PathBuf> {
        let valid = !campaign_id.is_empty()
            && campaign_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TargetingError::Validation(format!(
                "Campaign id '{}' cannot be used as a file name",
                campaign_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", campaign_id)))
    }
}

impl LiftConfigStore for JsonLiftConfigStore {
    fn get(&self, campaign_id: &str) -> Result<Option<ScriptLiftConfig>> {
        let path = self.path_for(campaign_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn put(&mut self, mut config: ScriptLiftConfig) -> Result<ScriptLiftConfig> {
        let path = self.path_for(&config.campaign_id)?;
        config.last_modified = Utc::now();
        let contents = serde_json::to_string_pretty(&config)?;

        // Readers see either the previous file or the complete new one.
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(contents.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| e.error)?;

        log::debug!("Wrote lift configuration to {}", path.display());
        Ok(config)
    }

    fn delete(&mut self, campaign_id: &str) -> Result<bool> {
        let path = self.path_for(campaign_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

/// Regenerator for setups with no prescription backend; only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRegenerator;

impl PrescriptionRegenerator for LoggingRegenerator {
    fn regenerate(&self, campaign_id: &str) -> Result<()> {
        log::info!("Prescription data regeneration requested for {}", campaign_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_config(campaign_id: &str) -> ScriptLiftConfig {
        let created = Utc::now();
        ScriptLiftConfig {
            campaign_id: campaign_id.to_string(),
            campaign_name: "Autumn launch".to_string(),
            medications: vec![MedicationLiftEntry {
                id: "atorva".to_string(),
                name: "Atorvastatin".to_string(),
                category: "statins".to_string(),
                baseline_prescriptions: 320.0,
                lift_percentage: 25.0,
                is_targeted: true,
                is_competitor: None,
            }],
            specialties: vec![WeightedLabel {
                name: "Cardiology".to_string(),
                percentage: 30.0,
            }],
            regions: Vec::new(),
            campaign_impact: CampaignImpact::default(),
            created_at: created,
            last_modified: created,
            notes: Some("first pass".to_string()),
        }
    }

    fn without_timestamp(mut config: ScriptLiftConfig) -> ScriptLiftConfig {
        config.last_modified = config.created_at;
        config
    }

    fn new_campaign() -> NewCampaign {
        NewCampaign {
            name: "Autumn launch".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
            target_medication_id: Some("atorva".to_string()),
            target_specialty: None,
            target_geographic_area: None,
            targeting_metadata: json!({}),
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryLiftConfigStore::new();
        let config = sample_config("campaign-1");
        let stored = store.put(config.clone()).unwrap();

        assert!(stored.last_modified >= config.last_modified);
        let fetched = store.get("campaign-1").unwrap().unwrap();
        assert_eq!(without_timestamp(fetched), config);
    }

    #[test]
    fn memory_store_last_write_wins_and_deletes() {
        let mut store = MemoryLiftConfigStore::new();
        store.put(sample_config("campaign-1")).unwrap();

        let mut second = sample_config("campaign-1");
        second.campaign_name = "Renamed".to_string();
        store.put(second).unwrap();

        assert_eq!(
            store.get("campaign-1").unwrap().unwrap().campaign_name,
            "Renamed"
        );
        assert!(store.delete("campaign-1").unwrap());
        assert!(!store.delete("campaign-1").unwrap());
        assert!(store.get("campaign-1").unwrap().is_none());
    }

    #[test]
    fn json_store_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonLiftConfigStore::open(temp_dir.path().join("lift")).unwrap();
        let config = sample_config("campaign-7");

        store.put(config.clone()).unwrap();
        assert!(temp_dir.path().join("lift").join("campaign-7.json").exists());

        let fetched = store.get("campaign-7").unwrap().unwrap();
        assert_eq!(without_timestamp(fetched), config);

        assert!(store.delete("campaign-7").unwrap());
        assert!(store.get("campaign-7").unwrap().is_none());
    }

    #[test]
    fn json_store_overwrites_without_leftover_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonLiftConfigStore::open(temp_dir.path()).unwrap();

        store.put(sample_config("campaign-3")).unwrap();
        let mut second = sample_config("campaign-3");
        second.campaign_name = "Rewritten".to_string();
        store.put(second).unwrap();

        let files: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("campaign-3.json")]);
        assert_eq!(
            store.get("campaign-3").unwrap().unwrap().campaign_name,
            "Rewritten"
        );
    }

    #[test]
    fn failed_json_write_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonLiftConfigStore::open(temp_dir.path()).unwrap();
        // A directory squatting on the target name makes the final rename fail.
        fs::create_dir(temp_dir.path().join("campaign-4.json")).unwrap();

        let err = store.put(sample_config("campaign-4")).unwrap_err();
        assert!(matches!(err, TargetingError::IoError(_)));

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("campaign-4.json")]);
        assert!(temp_dir.path().join("campaign-4.json").is_dir());
    }

    #[test]
    fn json_store_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLiftConfigStore::open(temp_dir.path()).unwrap();
        let err = store.get("../escape").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn campaign_store_creates_and_patches() {
        let mut store = MemoryCampaignStore::new();
        let id = store.create(new_campaign()).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);

        let updated = store
            .update(
                &id,
                CampaignPatch {
                    target_specialty: Some(Some("cardiology".to_string())),
                    ..CampaignPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.target_specialty.as_deref(), Some("cardiology"));
        assert_eq!(updated.target_medication_id.as_deref(), Some("atorva"));
        assert_eq!(store.fetch_by_id(&id).unwrap().unwrap(), updated);
    }

    #[test]
    fn patch_can_clear_optional_targets() {
        let mut store = MemoryCampaignStore::new();
        let id = store.create(new_campaign()).unwrap();

        let cleared = store
            .update(
                &id,
                CampaignPatch {
                    target_medication_id: Some(None),
                    ..CampaignPatch::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.target_medication_id, None);
        assert_eq!(cleared.name, "Autumn launch");
    }

    #[test]
    fn patch_json_distinguishes_null_from_missing() {
        let patch: CampaignPatch =
            serde_json::from_value(json!({ "target_specialty": null, "name": "Renamed" })).unwrap();
        assert_eq!(patch.target_specialty, Some(None));
        assert_eq!(patch.target_medication_id, None);
        assert_eq!(patch.name.as_deref(), Some("Renamed"));

        let round_trip = serde_json::to_value(&patch).unwrap();
        assert_eq!(round_trip, json!({ "name": "Renamed", "target_specialty": null }));
    }

    #[test]
    fn updating_missing_campaign_fails() {
        let mut store = MemoryCampaignStore::new();
        let err = store.update("nope", CampaignPatch::default()).unwrap_err();
        assert!(matches!(err, TargetingError::NotFound(_)));
    }
}
