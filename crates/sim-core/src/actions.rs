//! Player-driven transitions paid with research points, plus the shared
//! rejection path for actions the player cannot afford.

use crate::{
    clamp_influence, clamp_vulnerability, ChatAuthor, Notification, NotificationKind,
    SimulationState,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Local validation failures for player actions. These never reach the
/// network and never mutate the state beyond the chat message they produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: i64, have: i64 },
    #[error("insufficient research points: need {need}, have {have}")]
    InsufficientResearch { need: i64, have: i64 },
    #[error("upgrade already purchased: {0}")]
    AlreadyOwned(UpgradeKind),
    #[error("the game is over")]
    GameOver,
    #[error("unknown option: {0}")]
    UnknownOption(String),
}

/// Research upgrades; each can be bought once per game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    /// +5 influence in every region.
    MediaNetwork,
    /// Immediate cash grant.
    OffshoreAccounts,
    /// Lowers vulnerability in every region.
    Lobbyists,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 3] = [
        UpgradeKind::MediaNetwork,
        UpgradeKind::OffshoreAccounts,
        UpgradeKind::Lobbyists,
    ];

    /// Research point price.
    pub fn cost(&self) -> i64 {
        match self {
            UpgradeKind::MediaNetwork => 50,
            UpgradeKind::OffshoreAccounts => 80,
            UpgradeKind::Lobbyists => 120,
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpgradeKind::MediaNetwork => "media network",
            UpgradeKind::OffshoreAccounts => "offshore accounts",
            UpgradeKind::Lobbyists => "lobbyists",
        })
    }
}

impl FromStr for UpgradeKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "medianetwork" | "media" => Ok(UpgradeKind::MediaNetwork),
            "offshoreaccounts" | "offshore" => Ok(UpgradeKind::OffshoreAccounts),
            "lobbyists" | "lobby" => Ok(UpgradeKind::Lobbyists),
            _ => Err(ActionError::UnknownOption(s.to_string())),
        }
    }
}

const MEDIA_NETWORK_BOOST: f64 = 5.0;
const OFFSHORE_GRANT: i64 = 25_000;
const LOBBY_VULNERABILITY_CUT: f64 = 0.1;

/// Buy an upgrade with research points and apply its effect.
pub fn purchase_upgrade(
    state: &mut SimulationState,
    kind: UpgradeKind,
) -> Result<&Notification, ActionError> {
    if !state.active {
        return Err(ActionError::GameOver);
    }
    if state.upgrades.contains(&kind) {
        return Err(ActionError::AlreadyOwned(kind));
    }
    let cost = kind.cost();
    if state.assets.research_points < cost {
        return Err(ActionError::InsufficientResearch {
            need: cost,
            have: state.assets.research_points,
        });
    }
    state.assets.research_points = state.assets.research_points.saturating_sub(cost);
    match kind {
        UpgradeKind::MediaNetwork => {
            for r in state.regions.values_mut() {
                r.influence_level = clamp_influence(r.influence_level + MEDIA_NETWORK_BOOST);
            }
        }
        UpgradeKind::OffshoreAccounts => {
            state.assets.money = state.assets.money.saturating_add(OFFSHORE_GRANT)
        }
        UpgradeKind::Lobbyists => {
            for r in state.regions.values_mut() {
                r.vulnerability = clamp_vulnerability(r.vulnerability - LOBBY_VULNERABILITY_CUT);
            }
        }
    }
    state.upgrades.insert(kind);
    Ok(state.notify(
        NotificationKind::Positive,
        format!("Upgrade acquired: {kind}"),
    ))
}

/// Report a rejected action to the player as a system chat line.
pub fn record_rejection(state: &mut SimulationState, err: &ActionError) {
    state.post_chat(ChatAuthor::System, err.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RegionName, StartingConditions};

    fn fresh() -> SimulationState {
        SimulationState::new(&StartingConditions::default())
    }

    #[test]
    fn media_network_boosts_every_region() {
        let mut st = fresh();
        purchase_upgrade(&mut st, UpgradeKind::MediaNetwork).unwrap();
        assert_eq!(st.assets.research_points, 50);
        assert!(st.regions.values().all(|r| r.influence_level == 5.0));
    }

    #[test]
    fn upgrade_bought_once() {
        let mut st = fresh();
        st.assets.research_points = 1_000;
        purchase_upgrade(&mut st, UpgradeKind::OffshoreAccounts).unwrap();
        assert_eq!(st.assets.money, 175_000);
        let err = purchase_upgrade(&mut st, UpgradeKind::OffshoreAccounts).unwrap_err();
        assert_eq!(err, ActionError::AlreadyOwned(UpgradeKind::OffshoreAccounts));
    }

    #[test]
    fn offshore_grant_saturates() {
        let mut st = fresh();
        st.assets.money = i64::MAX - 1;
        purchase_upgrade(&mut st, UpgradeKind::OffshoreAccounts).unwrap();
        assert_eq!(st.assets.money, i64::MAX);
    }

    #[test]
    fn insufficient_research_leaves_state_untouched() {
        let mut st = fresh();
        let before = st.clone();
        let err = purchase_upgrade(&mut st, UpgradeKind::Lobbyists).unwrap_err();
        assert_eq!(err, ActionError::InsufficientResearch { need: 120, have: 100 });
        assert_eq!(st, before);
        record_rejection(&mut st, &err);
        assert_eq!(st.chat_log.len(), 1);
        assert_eq!(st.chat_log[0].author, ChatAuthor::System);
    }

    #[test]
    fn lobbyists_respect_vulnerability_floor() {
        let mut st = fresh();
        st.assets.research_points = 500;
        st.region_mut(RegionName::Europe).vulnerability = 0.15;
        purchase_upgrade(&mut st, UpgradeKind::Lobbyists).unwrap();
        assert_eq!(st.region(RegionName::Europe).vulnerability, 0.1);
        assert!((st.region(RegionName::Africa).vulnerability - 0.7).abs() < 1e-9);
    }

    #[test]
    fn ended_game_rejects_upgrades() {
        let mut st = fresh();
        st.active = false;
        assert_eq!(
            purchase_upgrade(&mut st, UpgradeKind::MediaNetwork).unwrap_err(),
            ActionError::GameOver
        );
    }

    #[test]
    fn parses_upgrade_names() {
        assert_eq!("media".parse::<UpgradeKind>().unwrap(), UpgradeKind::MediaNetwork);
        assert_eq!(
            "offshore-accounts".parse::<UpgradeKind>().unwrap(),
            UpgradeKind::OffshoreAccounts
        );
        assert!("moon".parse::<UpgradeKind>().is_err());
    }
}
