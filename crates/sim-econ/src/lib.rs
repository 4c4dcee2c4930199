#![deny(warnings)]

//! Economic models for FinanCity.
//!
//! This crate provides:
//! - The synthetic market indices plotted on the chart (a noisy random walk)
//! - The investment catalog and the invest transition, which debits money,
//!   buys regional influence and appends one chart point

use rand::Rng;
use serde::{Deserialize, Serialize};
use sim_core::{
    clamp_influence, ActionError, MarketPoint, Notification, NotificationKind, RegionName,
    SimulationState,
};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Number of chart points a new game starts with.
pub const HISTORY_DAYS: u32 = 7;

/// Index levels on day zero.
const BASE_STOCKS: f64 = 100.0;
const BASE_COMMODITIES: f64 = 80.0;
const BASE_CRYPTO: f64 = 50.0;

/// Per-step relative volatility of each index.
const VOL_STOCKS: f64 = 0.03;
const VOL_COMMODITIES: f64 = 0.02;
const VOL_CRYPTO: f64 = 0.08;

/// Indices never fall below this level.
const INDEX_FLOOR: f64 = 1.0;

/// Upward drift per step at 100 average influence.
const SENTIMENT_DRIFT: f64 = 0.01;

/// Investment options offered to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestmentKind {
    Stocks,
    RealEstate,
    Media,
}

impl InvestmentKind {
    pub const ALL: [InvestmentKind; 3] = [
        InvestmentKind::Stocks,
        InvestmentKind::RealEstate,
        InvestmentKind::Media,
    ];

    /// Price in money.
    pub fn cost(&self) -> i64 {
        match self {
            InvestmentKind::Stocks => 10_000,
            InvestmentKind::RealEstate => 25_000,
            InvestmentKind::Media => 40_000,
        }
    }

    /// Influence bought in the target region.
    pub fn influence_gain(&self) -> f64 {
        match self {
            InvestmentKind::Stocks => 5.0,
            InvestmentKind::RealEstate => 12.0,
            InvestmentKind::Media => 20.0,
        }
    }
}

impl fmt::Display for InvestmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvestmentKind::Stocks => "stocks",
            InvestmentKind::RealEstate => "real estate",
            InvestmentKind::Media => "media",
        })
    }
}

impl FromStr for InvestmentKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "stocks" | "stock" => Ok(InvestmentKind::Stocks),
            "realestate" | "property" => Ok(InvestmentKind::RealEstate),
            "media" => Ok(InvestmentKind::Media),
            _ => Err(ActionError::UnknownOption(s.to_string())),
        }
    }
}

/// Next chart point after `prev`.
///
/// Each index moves by uniform noise in [-vol, +vol] plus a drift that grows
/// with `sentiment` (average influence in [0, 100]). Levels are floored at 1.
pub fn next_market_point<R: Rng>(
    prev: Option<&MarketPoint>,
    sentiment: f64,
    rng: &mut R,
) -> MarketPoint {
    let drift = (sentiment.clamp(0.0, 100.0) / 100.0) * SENTIMENT_DRIFT;
    let mut step = |level: f64, vol: f64| -> f64 {
        let noise: f64 = rng.gen_range(-vol..=vol);
        (level * (1.0 + drift + noise)).max(INDEX_FLOOR)
    };
    match prev {
        None => MarketPoint {
            day: 0,
            stocks: BASE_STOCKS,
            commodities: BASE_COMMODITIES,
            crypto: BASE_CRYPTO,
        },
        Some(p) => MarketPoint {
            day: p.day + 1,
            stocks: step(p.stocks, VOL_STOCKS),
            commodities: step(p.commodities, VOL_COMMODITIES),
            crypto: step(p.crypto, VOL_CRYPTO),
        },
    }
}

/// Append one point to the state's market series.
pub fn append_market_point<R: Rng>(state: &mut SimulationState, rng: &mut R) -> MarketPoint {
    let sentiment = state.average_influence();
    let point = next_market_point(state.market_series.last(), sentiment, rng);
    state.market_series.push(point.clone());
    point
}

/// Seed a new game's chart with `days` points.
pub fn seed_history<R: Rng>(state: &mut SimulationState, days: u32, rng: &mut R) {
    for _ in 0..days {
        append_market_point(state, rng);
    }
}

/// Spend money to buy influence in a region.
///
/// Rejected without touching the state when the game is over or money is
/// short. On success the regional gain is clamped to [0, 100], the global
/// influence asset grows by the amount actually gained, and one market point
/// is appended.
pub fn invest<'a, R: Rng>(
    state: &'a mut SimulationState,
    kind: InvestmentKind,
    region: RegionName,
    rng: &mut R,
) -> Result<&'a Notification, ActionError> {
    if !state.active {
        return Err(ActionError::GameOver);
    }
    let cost = kind.cost();
    if state.assets.money < cost {
        return Err(ActionError::InsufficientFunds {
            need: cost,
            have: state.assets.money,
        });
    }
    state.assets.money = state.assets.money.saturating_sub(cost);
    let r = state.region_mut(region);
    let before = r.influence_level;
    r.influence_level = clamp_influence(before + kind.influence_gain());
    let gained = r.influence_level - before;
    state.assets.influence = state.assets.influence.saturating_add(gained.round() as i64);
    let point = append_market_point(state, rng);
    debug!(%region, %kind, cost, gained, day = point.day, "investment made");
    Ok(state.notify(
        NotificationKind::Positive,
        format!("Invested {cost} in {kind} across {region}"),
    ))
}
