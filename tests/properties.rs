use lift_projection::{
    example_data::ExampleDataGenerator,
    lift::{DefaultConfigRequest, LiftProjector},
    matching::{IdentityMatchSimulator, ManualClock},
    models::*,
    sizing::{BASE_PROVIDER_COUNT, REACH_PER_PROVIDER},
    AudienceSizer,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::time::Duration;

const MEDICATIONS: [&str; 6] = [
    "atorvastatin",
    "rosuvastatin",
    "metformin",
    "lisinopril",
    "ezetimibe",
    "evolocumab",
];
const SPECIALTIES: [&str; 4] = ["primary-care", "cardiology", "endocrinology", "nephrology"];
const REGIONS: [&str; 5] = ["northeast", "southeast", "midwest", "southwest", "west"];

fn subset(names: &'static [&'static str]) -> impl Strategy<Value = BTreeSet<String>> {
    proptest::sample::subsequence(names, 0..=names.len())
        .prop_map(|picked| picked.into_iter().map(str::to_string).collect())
}

fn filter_model() -> impl Strategy<Value = FilterModel> {
    (
        proptest::option::of(prop_oneof![Just("statins"), Just("diabetes")]),
        subset(&MEDICATIONS),
        subset(&MEDICATIONS),
        subset(&SPECIALTIES),
        subset(&REGIONS),
        prop_oneof![
            Just(VolumeTier::All),
            Just(VolumeTier::High),
            Just(VolumeTier::Medium),
            Just(VolumeTier::Low)
        ],
    )
        .prop_map(
            |(category, medications, excluded, specialties, regions, tier)| FilterModel {
                medication_category: category.map(str::to_string),
                medications,
                excluded_medications: excluded,
                specialties,
                regions,
                prescribing_volume: tier,
                timeframe: Timeframe::LastMonth,
            },
        )
}

proptest! {
    #[test]
    fn sizing_is_bounded_and_deterministic(filters in filter_model()) {
        let first = AudienceSizer::size(&filters);
        let second = AudienceSizer::size(&filters.clone());

        prop_assert_eq!(first, second);
        // Largest reachable product: all five regions (x1.05), nothing else.
        prop_assert!(first.provider_count <= BASE_PROVIDER_COUNT * 105 / 100);
        prop_assert_eq!(first.potential_reach, first.provider_count * REACH_PER_PROVIDER);
    }

    #[test]
    fn match_progress_never_moves_backwards(
        mut offsets in proptest::collection::vec(0u64..12_000, 1..40)
    ) {
        offsets.sort_unstable();
        let clock = ManualClock::new();
        let mut simulator = IdentityMatchSimulator::new(clock.clone(), MatchTiming::default());
        simulator.start(1000);

        let mut last = simulator.poll();
        let mut emitted = Vec::new();
        for offset in offsets {
            clock.set(Duration::from_millis(offset));
            let state = simulator.poll();
            prop_assert!(state.stage >= last.stage);
            prop_assert!(state.progress >= last.progress);
            prop_assert_eq!(state.result.is_some(), state.is_complete());
            emitted.extend(simulator.tick().into_iter().map(|s| s.stage));
            last = state;
        }

        let mut sorted = emitted.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(emitted, sorted);
    }

    #[test]
    fn retargeting_keeps_exactly_one_target(
        picks in proptest::collection::vec(0usize..7, 1..12),
        seed in any::<u64>(),
    ) {
        let config = ExampleDataGenerator::lift_config(
            "campaign-1",
            "Property run",
            &DefaultConfigRequest {
                target_medication_id: Some("rosuvastatin".to_string()),
                ..DefaultConfigRequest::default()
            },
            seed,
        );
        let ids: Vec<String> = config.medications.iter().map(|m| m.id.clone()).collect();
        let mut projector = LiftProjector::new(config);

        for pick in picks {
            let id = &ids[pick % ids.len()];
            projector.set_target(id).unwrap();

            let targeted: Vec<_> = projector
                .config()
                .medications
                .iter()
                .filter(|m| m.is_targeted)
                .collect();
            prop_assert_eq!(targeted.len(), 1);
            prop_assert_eq!(&targeted[0].id, id);
            prop_assert_eq!(targeted[0].lift_percentage, 25.0);
        }
    }
}
