//! Event catalog and the event-apply transition shared by the timer and
//! explicit triggers.

use crate::{
    clamp_influence, Notification, NotificationKind, RegionName, SimulationState, ValidationError,
    ECONOMY_FLOOR,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Placeholder substituted with the region label in message templates.
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Largest absolute magnitude a catalog entry may carry.
pub const MAX_EVENT_MAGNITUDE: f64 = 1e9;

/// Whether an event helps or hurts the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Negative,
    Positive,
}

impl From<EventKind> for NotificationKind {
    fn from(k: EventKind) -> Self {
        match k {
            EventKind::Negative => NotificationKind::Negative,
            EventKind::Positive => NotificationKind::Positive,
        }
    }
}

/// Field an event modifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetField {
    Influence,
    Economy,
    Money,
    Research,
}

/// Immutable template; bound to a region when applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEventDefinition {
    pub kind: EventKind,
    pub target: TargetField,
    /// Signed amount; for influence it is scaled by the region's vulnerability.
    pub magnitude: f64,
    /// Message with `{region}` where the region label goes.
    pub message_template: String,
}

impl GameEventDefinition {
    pub fn new(
        kind: EventKind,
        target: TargetField,
        magnitude: f64,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            target,
            magnitude,
            message_template: message_template.into(),
        }
    }
}

/// Built-in catalog used when the configuration does not supply one.
pub fn default_catalog() -> Vec<GameEventDefinition> {
    use EventKind::*;
    use TargetField::*;
    vec![
        GameEventDefinition::new(
            Negative,
            Influence,
            -25.0,
            "Protests in {region} turn public opinion against your firms",
        ),
        GameEventDefinition::new(
            Negative,
            Economy,
            -15.0,
            "A recession hits {region}; markets slide",
        ),
        GameEventDefinition::new(
            Negative,
            Money,
            -20_000.0,
            "Regulators in {region} fine your holdings",
        ),
        GameEventDefinition::new(
            Positive,
            Money,
            50_000.0,
            "A windfall trade in {region} pays off",
        ),
        GameEventDefinition::new(
            Positive,
            Influence,
            15.0,
            "A media campaign in {region} wins hearts and minds",
        ),
        GameEventDefinition::new(
            Positive,
            Research,
            30.0,
            "A think tank in {region} publishes findings in your favor",
        ),
        GameEventDefinition::new(
            Positive,
            Economy,
            10.0,
            "An infrastructure boom lifts {region}",
        ),
    ]
}

/// Substitute the region label into a template.
pub fn render_message(template: &str, region: RegionName) -> String {
    template.replace(REGION_PLACEHOLDER, region.label())
}

/// Validate one catalog entry.
pub fn validate_event_definition(def: &GameEventDefinition) -> Result<(), ValidationError> {
    if !def.magnitude.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if def.magnitude.abs() > MAX_EVENT_MAGNITUDE {
        return Err(ValidationError::MagnitudeOutOfRange(def.magnitude));
    }
    if def.message_template.trim().is_empty() {
        return Err(ValidationError::EmptyTemplate);
    }
    Ok(())
}

/// Validate a full catalog; it must be non-empty so the timer can draw from it.
pub fn validate_catalog(catalog: &[GameEventDefinition]) -> Result<(), ValidationError> {
    if catalog.is_empty() {
        return Err(ValidationError::EmptyCatalog);
    }
    for def in catalog {
        validate_event_definition(def)?;
    }
    Ok(())
}

/// Apply an event to a region and raise its notification.
///
/// Money and research are added directly to the assets. Influence is scaled
/// by the region's vulnerability and clamped to [0, 100]; economy is floored
/// at 50. The returned notification replaces any pending one.
pub fn apply_event<'a>(
    state: &'a mut SimulationState,
    def: &GameEventDefinition,
    region: RegionName,
) -> &'a Notification {
    match def.target {
        TargetField::Money => {
            let a = &mut state.assets;
            a.money = a.money.saturating_add(def.magnitude.round() as i64);
        }
        TargetField::Research => {
            let a = &mut state.assets;
            a.research_points = a.research_points.saturating_add(def.magnitude.round() as i64);
        }
        TargetField::Influence => {
            let r = state.region_mut(region);
            let impact = def.magnitude * r.vulnerability;
            r.influence_level = clamp_influence(r.influence_level + impact);
        }
        TargetField::Economy => {
            let r = state.region_mut(region);
            r.economy = (r.economy + def.magnitude).max(ECONOMY_FLOOR);
        }
    }
    let message = render_message(&def.message_template, region);
    debug!(%region, target = ?def.target, magnitude = def.magnitude, "event applied");
    state.notify(def.kind.into(), message)
}
