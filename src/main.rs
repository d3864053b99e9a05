use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Arg, ArgMatches, Command};
use itertools::Itertools;
use lift_projection::{
    campaign::{CampaignDraft, CampaignPlanner},
    comparison::ComparisonSession,
    lift::{DefaultConfigRequest, LiftProjector},
    matching::IdentityMatchSimulator,
    models::*,
    example_data::ExampleDataGenerator,
    store::{
        CampaignStore, JsonLiftConfigStore, LiftConfigStore, LoggingRegenerator,
        MemoryCampaignStore, MemoryLiftConfigStore, StaticReferenceData,
    },
    AudienceSizer,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = Command::new("Lift Projection Tool")
        .version("1.0")
        .author("Campaign Analytics Suite")
        .about("Size prescriber audiences and project campaign script lift")
        .arg(
            Arg::new("campaign-name")
                .long("campaign-name")
                .value_name("NAME")
                .help("Name of the campaign to plan")
                .default_value("Demo campaign"),
        )
        .arg(
            Arg::new("category")
                .short('c')
                .long("category")
                .value_name("CATEGORY")
                .help("Medication category to target"),
        )
        .arg(
            Arg::new("medication")
                .short('m')
                .long("medication")
                .value_name("ID")
                .help("Include prescribers of this medication")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("exclude")
                .short('x')
                .long("exclude")
                .value_name("ID")
                .help("Exclude prescribers of this medication")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("specialty")
                .short('s')
                .long("specialty")
                .value_name("ID")
                .help("Restrict to this specialty")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .value_name("ID")
                .help("Restrict to this region")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("TIER")
                .help("Prescribing volume tier: all, high, medium, low")
                .default_value("all"),
        )
        .arg(
            Arg::new("timeframe")
                .long("timeframe")
                .value_name("WINDOW")
                .help("Analysis timeframe: last_month, last_quarter, last_year")
                .default_value("last_month"),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("ID")
                .help("Target medication for lift projection"),
        )
        .arg(
            Arg::new("compare")
                .long("compare")
                .value_name("ID")
                .help("Compare against these medications instead of the whole class")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("NUMBER")
                .help("Seed for generated baselines")
                .default_value("42"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("DIR")
                .help("Directory for persisted lift configurations"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .help("Run the paced identity match instead of resolving it instantly")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let filters = create_filter_model(&matches)?;
    let reference = StaticReferenceData::new(ExampleDataGenerator::reference_data());

    let audience = AudienceSizer::size(&filters);
    println!(
        "Audience: {} providers, {} potential patient reach",
        audience.provider_count, audience.potential_reach
    );

    let identity_match = if matches.get_flag("simulate") {
        run_identity_match(audience.provider_count)
    } else {
        IdentityMatchState {
            stage: MatchStage::Complete,
            progress: 100,
            operation: None,
            result: Some(MatchResult::for_total(audience.provider_count)),
        }
    };

    let campaign_name = matches
        .get_one::<String>("campaign-name")
        .cloned()
        .unwrap_or_default();
    let target = matches
        .get_one::<String>("target")
        .cloned()
        .or_else(|| filters.medications.iter().next().cloned());
    let today = Utc::now().date_naive();

    let draft = CampaignDraft {
        name: campaign_name.clone(),
        start_date: Some(today),
        end_date: Some(today + Duration::days(90)),
        filters: filters.clone(),
        target_medication_id: target.clone(),
        target_specialty: filters.specialties.iter().next().cloned(),
        target_geographic_area: filters.regions.iter().next().cloned(),
        identity_match,
    };

    let mut campaigns = MemoryCampaignStore::new();
    let campaign_id = CampaignPlanner::create_campaign(&mut campaigns, &reference, &draft)
        .context("campaign could not be created")?;

    let seed: u64 = matches
        .get_one::<String>("seed")
        .map(String::as_str)
        .unwrap_or("42")
        .parse()
        .context("invalid seed")?;
    let medications = ExampleDataGenerator::reference_data().medications;
    let request = DefaultConfigRequest {
        target_medication_id: target,
        target_category: filters.medication_category.clone(),
        ..DefaultConfigRequest::default()
    };
    let config = LiftProjector::generate_default(
        &campaign_id,
        &campaign_name,
        &medications,
        &request,
        &LiftDefaults::default(),
        &mut StdRng::seed_from_u64(seed),
    );

    let mut projector = LiftProjector::new(config);
    if let Some(target_id) = projector.config().target().map(|t| t.id.clone()) {
        projector.set_target(&target_id)?;
    }
    if let Some(ids) = matches.get_many::<String>("compare") {
        projector.set_comparison_mode(ComparisonMode::SpecificIds(ids.cloned().collect()));
    }
    let totals = projector.totals();

    let mut store: Box<dyn LiftConfigStore> = match matches.get_one::<String>("store") {
        Some(dir) => Box::new(
            JsonLiftConfigStore::open(PathBuf::from(dir))
                .with_context(|| format!("cannot open store at {}", dir))?,
        ),
        None => Box::new(MemoryLiftConfigStore::new()),
    };
    let saved = CampaignPlanner::save_lift_config(
        &mut *store,
        &LoggingRegenerator,
        projector.into_config(),
    )?;

    let mut session = ComparisonSession::new(AudienceConfig::from_filters(
        &campaign_id,
        &campaign_name,
        filters,
    ));
    session.update_filters(FilterModel::default());
    let record = campaigns
        .fetch_by_id(&campaign_id)?
        .context("campaign disappeared from the store")?;

    print_summary(&record, &draft.identity_match, &saved, &totals);
    println!("\nAgainst an untargeted audience:");
    for diff in session.differences() {
        println!(
            "  {}: {} vs {} ({:+.1}%)",
            diff.label, diff.primary, diff.secondary, diff.percent_change
        );
    }
    Ok(())
}

fn create_filter_model(matches: &ArgMatches) -> anyhow::Result<FilterModel> {
    let collect = |name: &str| -> BTreeSet<String> {
        matches
            .get_many::<String>(name)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    let prescribing_volume = matches
        .get_one::<String>("volume")
        .map(String::as_str)
        .unwrap_or("all")
        .parse()?;
    let timeframe = matches
        .get_one::<String>("timeframe")
        .map(String::as_str)
        .unwrap_or("last_month")
        .parse()?;

    Ok(FilterModel {
        medication_category: matches.get_one::<String>("category").cloned(),
        medications: collect("medication"),
        excluded_medications: collect("exclude"),
        specialties: collect("specialty"),
        regions: collect("region"),
        prescribing_volume,
        timeframe,
    })
}

fn run_identity_match(total_providers: u64) -> IdentityMatchState {
    let mut simulator = IdentityMatchSimulator::with_system_clock();
    simulator.start(total_providers);

    loop {
        for state in simulator.tick() {
            println!(
                "  [{:>3}%] {}",
                state.progress,
                state.operation.as_deref().unwrap_or("")
            );
        }
        let state = simulator.poll();
        if state.is_complete() {
            return state;
        }
        if let Some(wait) = simulator.next_transition_in() {
            std::thread::sleep(wait);
        }
    }
}

fn print_summary(
    record: &CampaignRecord,
    identity_match: &IdentityMatchState,
    config: &ScriptLiftConfig,
    totals: &LiftTotals,
) {
    println!("\n=== CAMPAIGN SUMMARY ===");
    println!("Campaign: {} ({})", record.name, record.id);
    println!("Runs: {} to {}", record.start_date, record.end_date);

    if let Some(result) = identity_match.result {
        println!(
            "Identity match: {} of {} providers ({}%)",
            result.matched_providers, result.total_providers, result.match_percentage
        );
    }

    if config.medications.is_empty() {
        println!("\nNo medications configured for lift projection.");
        return;
    }

    println!("\nMedications:");
    for entry in &config.medications {
        println!(
            "  {:<16} {:<14} baseline {:>5.0}  lift {:>+6.1}%  projected {:>6.1}{}",
            entry.name,
            entry.category,
            entry.baseline_prescriptions,
            entry.lift_percentage,
            LiftProjector::projected_volume(entry),
            if entry.is_targeted { "  <- target" } else { "" }
        );
    }

    println!("\nLift projection:");
    println!(
        "  Target:     {:.0} -> {:.0} ({:+.0}, {:+.1}%)",
        totals.target.baseline,
        totals.target.projected,
        totals.target.change,
        totals.target.percent_change
    );
    println!(
        "  Comparison: {:.0} -> {:.0} ({:+.0}, {:+.1}%)",
        totals.comparison.baseline,
        totals.comparison.projected,
        totals.comparison.change,
        totals.comparison.percent_change
    );

    println!(
        "\nWeighted specialties: {}",
        config
            .specialties
            .iter()
            .map(|s| format!("{} {:.0}%", s.name, s.percentage))
            .join(", ")
    );
    println!(
        "Campaign impact: overall lift {:.1}%, ROI {:.1}x, share change {:+.1} pts, {}",
        config.campaign_impact.overall_lift_percentage,
        config.campaign_impact.estimated_roi,
        config.campaign_impact.market_share_change,
        config.campaign_impact.time_to_impact
    );
}
