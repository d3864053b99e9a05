use crate::{
    lift::{DefaultConfigRequest, LiftProjector, COMPETITOR_CATEGORY},
    models::*,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub struct ExampleDataGenerator;

impl ExampleDataGenerator {
    /// Fixed medication, specialty and region catalogue for demos and tests.
    pub fn reference_data() -> ReferenceData {
        let medications = [
            ("atorvastatin", "Atorvastatin", "statins"),
            ("rosuvastatin", "Rosuvastatin", "statins"),
            ("simvastatin", "Simvastatin", "statins"),
            ("pravastatin", "Pravastatin", "statins"),
            ("metformin", "Metformin", "diabetes"),
            ("sitagliptin", "Sitagliptin", "diabetes"),
            ("empagliflozin", "Empagliflozin", "diabetes"),
            ("lisinopril", "Lisinopril", "hypertension"),
            ("amlodipine", "Amlodipine", "hypertension"),
            ("ezetimibe", "Ezetimibe", COMPETITOR_CATEGORY),
            ("evolocumab", "Evolocumab", COMPETITOR_CATEGORY),
            ("bempedoic-acid", "Bempedoic Acid", COMPETITOR_CATEGORY),
        ]
        .into_iter()
        .map(|(id, name, category)| Medication {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
        })
        .collect();

        let specialties = [
            ("primary-care", "Primary Care"),
            ("cardiology", "Cardiology"),
            ("endocrinology", "Endocrinology"),
            ("internal-medicine", "Internal Medicine"),
            ("nephrology", "Nephrology"),
        ]
        .into_iter()
        .map(|(id, name)| Specialty {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect();

        let regions = [
            ("northeast", "Northeast", "census_region"),
            ("southeast", "Southeast", "census_region"),
            ("midwest", "Midwest", "census_region"),
            ("southwest", "Southwest", "census_region"),
            ("west", "West", "census_region"),
        ]
        .into_iter()
        .map(|(id, name, region_type)| Region {
            id: id.to_string(),
            name: name.to_string(),
            region_type: region_type.to_string(),
        })
        .collect();

        ReferenceData {
            medications,
            specialties,
            regions,
        }
    }

    /// Default lift configuration with reproducible baselines.
    pub fn lift_config(
        campaign_id: &str,
        campaign_name: &str,
        request: &DefaultConfigRequest,
        seed: u64,
    ) -> ScriptLiftConfig {
        let mut rng = StdRng::seed_from_u64(seed);
        let reference = Self::reference_data();
        LiftProjector::generate_default(
            campaign_id,
            campaign_name,
            &reference.medications,
            request,
            &LiftDefaults::default(),
            &mut rng,
        )
    }
}
