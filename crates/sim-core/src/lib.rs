#![deny(warnings)]

//! Core domain models and invariants for FinanCity.
//!
//! This crate defines the serializable session state shared by every other
//! crate, the event catalog, and the pure transition functions (event-apply,
//! upgrade, tick) that are the only way the state is mutated.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;

pub mod actions;
pub mod events;
pub mod tick;

pub use actions::{purchase_upgrade, record_rejection, ActionError, UpgradeKind};
pub use events::{
    apply_event, default_catalog, render_message, validate_catalog, validate_event_definition,
    EventKind, GameEventDefinition, TargetField, MAX_EVENT_MAGNITUDE,
};
pub use tick::{drift_vulnerability, tick, TickOutcome};

/// Lower bound of a region's vulnerability multiplier.
pub const VULNERABILITY_MIN: f64 = 0.1;
/// Upper bound of a region's vulnerability multiplier.
pub const VULNERABILITY_MAX: f64 = 1.0;
/// A region's economy never drops below this floor.
pub const ECONOMY_FLOOR: f64 = 50.0;
/// Influence ceiling applied on every path that raises influence.
pub const INFLUENCE_MAX: f64 = 100.0;

/// One of the six fixed world areas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegionName {
    NorthAmerica,
    SouthAmerica,
    Europe,
    Africa,
    Asia,
    Oceania,
}

impl RegionName {
    /// Every region, in map order.
    pub const ALL: [RegionName; 6] = [
        RegionName::NorthAmerica,
        RegionName::SouthAmerica,
        RegionName::Europe,
        RegionName::Africa,
        RegionName::Asia,
        RegionName::Oceania,
    ];

    /// Human-readable label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            RegionName::NorthAmerica => "North America",
            RegionName::SouthAmerica => "South America",
            RegionName::Europe => "Europe",
            RegionName::Africa => "Africa",
            RegionName::Asia => "Asia",
            RegionName::Oceania => "Oceania",
        }
    }

    /// Vulnerability a region starts a fresh game with.
    pub fn base_vulnerability(&self) -> f64 {
        match self {
            RegionName::NorthAmerica => 0.4,
            RegionName::SouthAmerica => 0.6,
            RegionName::Europe => 0.3,
            RegionName::Africa => 0.8,
            RegionName::Asia => 0.5,
            RegionName::Oceania => 0.35,
        }
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RegionName {
    type Err = ValidationError;

    /// Accepts the label or a compact form: "north-america", "NorthAmerica", "na".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "northamerica" | "na" => Ok(RegionName::NorthAmerica),
            "southamerica" | "sa" => Ok(RegionName::SouthAmerica),
            "europe" | "eu" => Ok(RegionName::Europe),
            "africa" | "af" => Ok(RegionName::Africa),
            "asia" | "as" => Ok(RegionName::Asia),
            "oceania" | "oc" => Ok(RegionName::Oceania),
            _ => Err(ValidationError::UnknownRegion(s.to_string())),
        }
    }
}

/// Process-wide resource pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    /// Cash available for investments.
    pub money: i64,
    /// Global influence score.
    pub influence: i64,
    /// Research points spent on upgrades.
    pub research_points: i64,
}

/// Per-region simulation values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Influence held in the region, in [0, 100].
    pub influence_level: f64,
    /// Multiplier applied to influence events, in [0.1, 1.0].
    pub vulnerability: f64,
    /// Economy index, never below 50.
    pub economy: f64,
}

impl Region {
    fn fresh(name: RegionName) -> Self {
        Self {
            influence_level: 0.0,
            vulnerability: name.base_vulnerability(),
            economy: 100.0,
        }
    }
}

/// The fixed region set: exactly one slot per [`RegionName`].
///
/// Serialized as a map keyed by region name; a map that lacks a region or
/// carries extra keys is rejected on deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<RegionName, Region>",
    into = "BTreeMap<RegionName, Region>"
)]
pub struct Regions([Region; 6]);

type RegionIter<'a> =
    std::iter::Zip<std::array::IntoIter<RegionName, 6>, std::slice::Iter<'a, Region>>;

impl Regions {
    fn fresh() -> Self {
        Self(RegionName::ALL.map(Region::fresh))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Regions paired with their names, in map order.
    pub fn iter(&self) -> RegionIter<'_> {
        RegionName::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> std::slice::Iter<'_, Region> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> std::slice::IterMut<'_, Region> {
        self.0.iter_mut()
    }
}

impl Index<RegionName> for Regions {
    type Output = Region;

    fn index(&self, name: RegionName) -> &Region {
        &self.0[name as usize]
    }
}

impl IndexMut<RegionName> for Regions {
    fn index_mut(&mut self, name: RegionName) -> &mut Region {
        &mut self.0[name as usize]
    }
}

impl<'a> IntoIterator for &'a Regions {
    type Item = (RegionName, &'a Region);
    type IntoIter = RegionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl TryFrom<BTreeMap<RegionName, Region>> for Regions {
    type Error = ValidationError;

    fn try_from(mut map: BTreeMap<RegionName, Region>) -> Result<Self, Self::Error> {
        if map.len() != RegionName::ALL.len() {
            return Err(ValidationError::RegionSetMismatch);
        }
        let mut slots = Vec::with_capacity(RegionName::ALL.len());
        for name in RegionName::ALL {
            slots.push(map.remove(&name).ok_or(ValidationError::RegionSetMismatch)?);
        }
        let slots: [Region; 6] = slots
            .try_into()
            .map_err(|_| ValidationError::RegionSetMismatch)?;
        Ok(Self(slots))
    }
}

impl From<Regions> for BTreeMap<RegionName, Region> {
    fn from(regions: Regions) -> Self {
        RegionName::ALL.into_iter().zip(regions.0).collect()
    }
}

/// One point of the synthetic market chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    /// Chart day; strictly increasing along the series.
    pub day: u32,
    /// Stock index value, never below 1.
    pub stocks: f64,
    /// Commodities index value, never below 1.
    pub commodities: f64,
    /// Crypto index value, never below 1.
    pub crypto: f64,
}

/// Tone of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A setback for the player.
    Negative,
    /// A gain for the player.
    Positive,
    /// Neutral status, such as the end of the game.
    Informational,
}

/// Transient banner shown to the player; cleared by a timer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic id so a clear timer only removes the banner it was armed for.
    pub id: u64,
    /// Tone used to style the banner.
    pub kind: NotificationKind,
    /// Rendered text shown to the player.
    pub message: String,
}

/// Who wrote a chat line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatAuthor {
    /// The person playing the session.
    Player,
    /// Remote advisor replies, or the local fallback text.
    Advisor,
    /// Local bookkeeping such as rejected actions.
    System,
}

/// One line of the advisor chat log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the line.
    pub author: ChatAuthor,
    /// Line content as displayed.
    pub text: String,
}

/// Fixed snapshot a new game starts from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingConditions {
    /// Length of a game in seconds.
    pub duration_secs: u32,
    /// Opening cash.
    pub money: i64,
    /// Opening global influence.
    pub influence: i64,
    /// Opening research points.
    pub research_points: i64,
}

impl Default for StartingConditions {
    fn default() -> Self {
        Self {
            duration_secs: 300,
            money: 150_000,
            influence: 0,
            research_points: 100,
        }
    }
}

/// Aggregate state of one game session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Money, global influence and research points.
    pub assets: Assets,
    /// The fixed region set; never gains or loses regions.
    pub regions: Regions,
    /// Append-only chart data.
    pub market_series: Vec<MarketPoint>,
    /// Seconds left on the game clock.
    pub time_remaining: u32,
    /// Once false, ticks no longer mutate anything.
    pub active: bool,
    /// Banner currently shown, if any; a new one replaces it.
    pub pending_notification: Option<Notification>,
    /// Append-only conversation with the advisor.
    pub chat_log: Vec<ChatMessage>,
    /// Upgrades bought this session; each at most once.
    pub upgrades: BTreeSet<UpgradeKind>,
    /// Id handed to the next notification.
    next_notification_id: u64,
}

impl SimulationState {
    /// Fresh state from the given starting conditions, with an empty market series.
    pub fn new(start: &StartingConditions) -> Self {
        Self {
            assets: Assets {
                money: start.money,
                influence: start.influence,
                research_points: start.research_points,
            },
            regions: Regions::fresh(),
            market_series: Vec::new(),
            time_remaining: start.duration_secs,
            active: true,
            pending_notification: None,
            chat_log: Vec::new(),
            upgrades: BTreeSet::new(),
            next_notification_id: 1,
        }
    }

    pub fn region(&self, name: RegionName) -> &Region {
        &self.regions[name]
    }

    pub fn region_mut(&mut self, name: RegionName) -> &mut Region {
        &mut self.regions[name]
    }

    /// Replace the pending notification and return it.
    pub fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) -> &Notification {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.pending_notification.insert(Notification {
            id,
            kind,
            message: message.into(),
        })
    }

    /// Clear the pending notification if it is still the one with `id`.
    pub fn clear_notification(&mut self, id: u64) -> bool {
        match &self.pending_notification {
            Some(n) if n.id == id => {
                self.pending_notification = None;
                true
            }
            _ => false,
        }
    }

    pub fn post_chat(&mut self, author: ChatAuthor, text: impl Into<String>) {
        self.chat_log.push(ChatMessage {
            author,
            text: text.into(),
        });
    }

    /// Mean influence across all regions.
    pub fn average_influence(&self) -> f64 {
        self.regions.values().map(|r| r.influence_level).sum::<f64>() / self.regions.len() as f64
    }
}

/// Clamp an influence level to [0, 100].
pub fn clamp_influence(v: f64) -> f64 {
    v.clamp(0.0, INFLUENCE_MAX)
}

/// Clamp a vulnerability to [0.1, 1.0].
pub fn clamp_vulnerability(v: f64) -> f64 {
    v.clamp(VULNERABILITY_MIN, VULNERABILITY_MAX)
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Vulnerability outside [0.1, 1.0].
    #[error("vulnerability {0} outside [0.1, 1.0]")]
    VulnerabilityOutOfRange(f64),
    /// Economy below the floor.
    #[error("economy {0} below floor of 50")]
    EconomyBelowFloor(f64),
    /// Influence outside [0, 100].
    #[error("influence {0} outside [0, 100]")]
    InfluenceOutOfRange(f64),
    /// Region set does not match the fixed six.
    #[error("region set must contain exactly the six fixed regions")]
    RegionSetMismatch,
    /// Unknown region name.
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    /// Event magnitude beyond what the asset counters can absorb.
    #[error("event magnitude {0} outside [-1e9, 1e9]")]
    MagnitudeOutOfRange(f64),
    /// Event message template is blank.
    #[error("event message template is empty")]
    EmptyTemplate,
    /// Event catalog has no entries.
    #[error("event catalog is empty")]
    EmptyCatalog,
    /// Market series days must strictly increase.
    #[error("market series day {0} is not increasing")]
    NonIncreasingDay(u32),
}

/// Validate one region's values.
pub fn validate_region(r: &Region) -> Result<(), ValidationError> {
    if !(r.influence_level.is_finite() && r.vulnerability.is_finite() && r.economy.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if !(VULNERABILITY_MIN..=VULNERABILITY_MAX).contains(&r.vulnerability) {
        return Err(ValidationError::VulnerabilityOutOfRange(r.vulnerability));
    }
    if r.economy < ECONOMY_FLOOR {
        return Err(ValidationError::EconomyBelowFloor(r.economy));
    }
    if !(0.0..=INFLUENCE_MAX).contains(&r.influence_level) {
        return Err(ValidationError::InfluenceOutOfRange(r.influence_level));
    }
    Ok(())
}

/// Validate the whole state: region values and chart ordering.
pub fn validate_state(state: &SimulationState) -> Result<(), ValidationError> {
    for r in state.regions.values() {
        validate_region(r)?;
    }
    let mut last: Option<u32> = None;
    for p in &state.market_series {
        if let Some(prev) = last {
            if p.day <= prev {
                return Err(ValidationError::NonIncreasingDay(p.day));
            }
        }
        last = Some(p.day);
    }
    Ok(())
}
