//! Scripted identity-match progress.
//!
//! There is no real entity resolution here: a run walks a fixed sequence of
//! stages paced by wall-clock delays and finishes with a 98% match. State is
//! derived from the elapsed time of the current run on every read, so there
//! are no pending callbacks that could fire after a cancel.

use crate::models::*;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const MATCH_PERCENTAGE: u8 = 98;

const PARSING_LABEL: &str = "Parsing provider records";
const MATCHING_LABEL: &str = "Matching providers against registry";
const ANALYZING_LABEL: &str = "Analyzing match quality";
const FINALIZING_LABEL: &str = "Finalizing results";
const COMPLETE_LABEL: &str = "Identity match complete";

/// Monotonic time source for the simulator.
pub trait Clock: fmt::Debug {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Test clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Identifies one started run. Invalid as soon as the run is cancelled or
/// replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchTicket(u64);

#[derive(Debug)]
struct MatchRun {
    generation: u64,
    started_at: Duration,
    total_providers: u64,
    last_emitted: Option<MatchStage>,
}

#[derive(Debug)]
pub struct IdentityMatchSimulator<C: Clock = SystemClock> {
    clock: C,
    timing: MatchTiming,
    generation: u64,
    run: Option<MatchRun>,
}

impl IdentityMatchSimulator<SystemClock> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock::new(), MatchTiming::default())
    }
}

impl<C: Clock> IdentityMatchSimulator<C> {
    pub fn new(clock: C, timing: MatchTiming) -> Self {
        Self {
            clock,
            timing,
            generation: 0,
            run: None,
        }
    }

    /// Start a run for `total_providers`, cancelling any run in flight.
    ///
    /// The count is captured here and never re-read.
    pub fn start(&mut self, total_providers: u64) -> MatchTicket {
        self.cancel();
        self.generation += 1;
        self.run = Some(MatchRun {
            generation: self.generation,
            started_at: self.clock.now(),
            total_providers,
            last_emitted: None,
        });
        log::debug!(
            "Identity match run {} started for {} providers",
            self.generation,
            total_providers
        );
        MatchTicket(self.generation)
    }

    /// Abandon the current run, if any. Outstanding tickets become stale.
    pub fn cancel(&mut self) {
        if let Some(run) = self.run.take() {
            log::debug!("Identity match run {} cancelled", run.generation);
        }
    }

    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    pub fn is_current(&self, ticket: MatchTicket) -> bool {
        self.run
            .as_ref()
            .map_or(false, |run| run.generation == ticket.0)
    }

    /// Current snapshot; `not_started` when no run is active.
    pub fn poll(&self) -> IdentityMatchState {
        match &self.run {
            Some(run) => Self::state_at(
                run.total_providers,
                self.clock.now().saturating_sub(run.started_at),
                &self.timing,
            ),
            None => IdentityMatchState::not_started(),
        }
    }

    /// Snapshot for a specific run, or `None` once that run was cancelled.
    pub fn snapshot(&self, ticket: MatchTicket) -> Option<IdentityMatchState> {
        self.is_current(ticket).then(|| self.poll())
    }

    /// One snapshot per stage entered since the previous tick, in order.
    ///
    /// Stages passed between two ticks are still reported, so an observer
    /// polling late never sees a stage skipped.
    pub fn tick(&mut self) -> Vec<IdentityMatchState> {
        let current = self.poll();
        let run = match self.run.as_mut() {
            Some(run) => run,
            None => return Vec::new(),
        };

        let mut entered = Vec::new();
        for stage in WORKING_STAGES {
            if stage > current.stage {
                break;
            }
            if run.last_emitted.map_or(false, |last| stage <= last) {
                continue;
            }
            if stage == current.stage {
                entered.push(current.clone());
            } else {
                entered.push(Self::stage_entry(stage, run.total_providers));
            }
            run.last_emitted = Some(stage);
        }
        entered
    }

    /// Time until the next stage boundary of the current run.
    pub fn next_transition_in(&self) -> Option<Duration> {
        let run = self.run.as_ref()?;
        let elapsed = self.clock.now().saturating_sub(run.started_at);
        Self::boundaries(&self.timing)
            .into_iter()
            .find(|boundary| *boundary > elapsed)
            .map(|boundary| boundary - elapsed)
    }

    /// State of a run of `total_providers` after `elapsed` time.
    pub fn state_at(
        total_providers: u64,
        elapsed: Duration,
        timing: &MatchTiming,
    ) -> IdentityMatchState {
        let [matching_at, analyzing_at, finalizing_at, complete_at] = Self::boundaries(timing);

        if elapsed < matching_at {
            Self::stage_entry(MatchStage::Parsing, total_providers)
        } else if elapsed < analyzing_at {
            Self::stage_entry(MatchStage::Matching, total_providers)
        } else if elapsed < finalizing_at {
            Self::stage_entry(MatchStage::Analyzing, total_providers)
        } else if elapsed < complete_at {
            IdentityMatchState {
                stage: MatchStage::Analyzing,
                progress: 100,
                operation: Some(FINALIZING_LABEL.to_string()),
                result: None,
            }
        } else {
            Self::stage_entry(MatchStage::Complete, total_providers)
        }
    }

    fn boundaries(timing: &MatchTiming) -> [Duration; 4] {
        let matching_at = timing.parsing;
        let analyzing_at = matching_at + timing.matching;
        let finalizing_at = analyzing_at + timing.analyzing;
        let complete_at = finalizing_at + timing.completion_hold;
        [matching_at, analyzing_at, finalizing_at, complete_at]
    }

    fn stage_entry(stage: MatchStage, total_providers: u64) -> IdentityMatchState {
        let (progress, label) = match stage {
            MatchStage::NotStarted => return IdentityMatchState::not_started(),
            MatchStage::Parsing => (10, PARSING_LABEL),
            MatchStage::Matching => (30, MATCHING_LABEL),
            MatchStage::Analyzing => (70, ANALYZING_LABEL),
            MatchStage::Complete => (100, COMPLETE_LABEL),
        };
        IdentityMatchState {
            stage,
            progress,
            operation: Some(label.to_string()),
            result: (stage == MatchStage::Complete).then(|| MatchResult::for_total(total_providers)),
        }
    }
}

impl MatchResult {
    /// Terminal result for a run over `total_providers`; always a 98% match.
    pub fn for_total(total_providers: u64) -> Self {
        Self {
            // Widened so the product cannot overflow; the quotient always fits.
            matched_providers: (u128::from(total_providers) * u128::from(MATCH_PERCENTAGE) / 100)
                as u64,
            total_providers,
            match_percentage: MATCH_PERCENTAGE,
        }
    }
}

const WORKING_STAGES: [MatchStage; 4] = [
    MatchStage::Parsing,
    MatchStage::Matching,
    MatchStage::Analyzing,
    MatchStage::Complete,
];
