use crate::{errors::TargetingError, models::*};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

impl FilterModel {
    /// True when no field deviates from its unset default.
    pub fn is_unset(&self) -> bool {
        *self == FilterModel::default()
    }

    /// Fields that differ between `self` and `other`, in declaration order.
    pub fn diff(&self, other: &FilterModel) -> Vec<FilterField> {
        let mut changed = Vec::new();

        if self.medication_category != other.medication_category {
            changed.push(FilterField::MedicationCategory);
        }
        if self.medications != other.medications {
            changed.push(FilterField::Medications);
        }
        if self.excluded_medications != other.excluded_medications {
            changed.push(FilterField::ExcludedMedications);
        }
        if self.specialties != other.specialties {
            changed.push(FilterField::Specialties);
        }
        if self.regions != other.regions {
            changed.push(FilterField::Regions);
        }
        if self.prescribing_volume != other.prescribing_volume {
            changed.push(FilterField::PrescribingVolume);
        }
        if self.timeframe != other.timeframe {
            changed.push(FilterField::Timeframe);
        }

        changed
    }

    /// Medication ids that are both included and excluded.
    pub fn overlapping_medications(&self) -> BTreeSet<String> {
        self.medications
            .intersection(&self.excluded_medications)
            .cloned()
            .collect()
    }

    /// Free-form record of every field, stored as `targeting_metadata`.
    pub fn to_metadata(&self) -> serde_json::Value {
        json!({
            "medication_category": self.medication_category,
            "medications": self.medications,
            "excluded_medications": self.excluded_medications,
            "specialties": self.specialties,
            "regions": self.regions,
            "prescribing_volume": self.prescribing_volume.as_str(),
            "timeframe": self.timeframe.as_str(),
        })
    }
}

impl VolumeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeTier::All => "all",
            VolumeTier::High => "high",
            VolumeTier::Medium => "medium",
            VolumeTier::Low => "low",
        }
    }
}

impl FromStr for VolumeTier {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(VolumeTier::All),
            "high" => Ok(VolumeTier::High),
            "medium" => Ok(VolumeTier::Medium),
            "low" => Ok(VolumeTier::Low),
            other => Err(TargetingError::Validation(format!(
                "Unknown prescribing volume tier '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for VolumeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::LastMonth => "last_month",
            Timeframe::LastQuarter => "last_quarter",
            Timeframe::LastYear => "last_year",
        }
    }
}

impl FromStr for Timeframe {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_month" => Ok(Timeframe::LastMonth),
            "last_quarter" => Ok(Timeframe::LastQuarter),
            "last_year" => Ok(Timeframe::LastYear),
            other => Err(TargetingError::Validation(format!(
                "Unknown analysis timeframe '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
