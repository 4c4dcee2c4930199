//! One-second tick transition: countdown, random events and vulnerability drift.

use crate::{
    apply_event, clamp_vulnerability, GameEventDefinition, NotificationKind, RegionName,
    SimulationState,
};
use rand::Rng;

/// Every this many seconds a random event may fire.
pub const EVENT_PERIOD_SECS: u32 = 10;
/// Chance that an event fires on an event second.
pub const EVENT_CHANCE: f64 = 0.4;
/// Every this many seconds every region's vulnerability drifts.
pub const DRIFT_PERIOD_SECS: u32 = 5;
/// Maximum absolute vulnerability change per drift.
pub const DRIFT_SPAN: f64 = 0.05;

/// Message raised when the clock runs out.
pub const GAME_OVER_MESSAGE: &str = "Time is up! The markets have closed.";

/// An event the tick applied.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedEvent {
    pub catalog_index: usize,
    pub region: RegionName,
    pub notification_id: u64,
}

/// What a tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// The game was not active; nothing changed.
    Inactive,
    /// The clock reached zero on this tick.
    Ended { notification_id: u64 },
    /// The clock advanced and the game continues.
    Advanced {
        event: Option<AppliedEvent>,
        drifted: bool,
    },
}

impl TickOutcome {
    /// Id of the notification the tick raised, if any.
    pub fn notification_id(&self) -> Option<u64> {
        match self {
            TickOutcome::Ended { notification_id } => Some(*notification_id),
            TickOutcome::Advanced {
                event: Some(e), ..
            } => Some(e.notification_id),
            _ => None,
        }
    }
}

/// Advance the session clock by one second.
pub fn tick<R: Rng>(
    state: &mut SimulationState,
    catalog: &[GameEventDefinition],
    rng: &mut R,
) -> TickOutcome {
    if !state.active {
        return TickOutcome::Inactive;
    }
    state.time_remaining = state.time_remaining.saturating_sub(1);
    if state.time_remaining == 0 {
        state.active = false;
        let id = state.notify(NotificationKind::Informational, GAME_OVER_MESSAGE).id;
        return TickOutcome::Ended {
            notification_id: id,
        };
    }

    let mut event = None;
    if state.time_remaining % EVENT_PERIOD_SECS == 0
        && !catalog.is_empty()
        && rng.gen_bool(EVENT_CHANCE)
    {
        let catalog_index = rng.gen_range(0..catalog.len());
        let region = RegionName::ALL[rng.gen_range(0..RegionName::ALL.len())];
        let notification_id = apply_event(state, &catalog[catalog_index], region).id;
        event = Some(AppliedEvent {
            catalog_index,
            region,
            notification_id,
        });
    }

    let drifted = state.time_remaining % DRIFT_PERIOD_SECS == 0;
    if drifted {
        drift_vulnerability(state, rng);
    }
    TickOutcome::Advanced { event, drifted }
}

/// Move every region's vulnerability by a uniform delta in [-0.05, 0.05].
pub fn drift_vulnerability<R: Rng>(state: &mut SimulationState, rng: &mut R) {
    for r in state.regions.values_mut() {
        let delta: f64 = rng.gen_range(-DRIFT_SPAN..=DRIFT_SPAN);
        r.vulnerability = clamp_vulnerability(r.vulnerability + delta);
    }
}
