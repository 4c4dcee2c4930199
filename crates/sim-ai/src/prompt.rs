//! Request payloads, wire format and prompt construction.

use serde::{Deserialize, Serialize};
use sim_core::SimulationState;
use std::fmt::Write as _;

/// Shown to the player when the advisor cannot be reached.
pub const CHAT_FALLBACK: &str =
    "The advisor line is down. Markets wait for no one: try again shortly.";

/// Shown when a risk analysis could not be produced.
pub const ANALYSIS_FALLBACK: &str =
    "Risk desk unavailable. Watch the regions with the highest vulnerability.";

const ADVISOR_PERSONA: &str = "You are a ruthless but witty financial advisor in a satirical \
game about buying global influence. Answer in at most three sentences and stay in character.";

const ANALYST_PERSONA: &str = "You are a risk analyst in a satirical finance game. Rank the \
most exposed regions and suggest one move. Be brief.";

/// One logical text-generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub user_context: String,
    pub temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    system_instruction: WireContent<'a>,
    contents: Vec<WireContent<'a>>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct WireGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    content: Option<WireCandidateContent>,
}

#[derive(Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireCandidatePart>,
}

#[derive(Deserialize)]
struct WireCandidatePart {
    text: Option<String>,
}

impl GenerateRequest {
    /// JSON body sent to the endpoint.
    pub fn to_wire(&self) -> serde_json::Value {
        let wire = WireRequest {
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart {
                    text: &self.system_instruction,
                }],
            },
            contents: vec![WireContent {
                role: Some("user"),
                parts: vec![WirePart {
                    text: &self.user_context,
                }],
            }],
            generation_config: WireGenerationConfig {
                temperature: self.temperature,
            },
        };
        // Serializing plain structs of strings and floats cannot fail.
        serde_json::to_value(wire).unwrap_or(serde_json::Value::Null)
    }
}

/// Text of the first candidate; `None` when the field is missing or blank.
pub fn extract_text(body: &str) -> Option<String> {
    let parsed: WireResponse = serde_json::from_str(body).ok()?;
    let text = parsed
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Summary of assets and regions interpolated into every prompt.
pub fn describe_state(state: &SimulationState) -> String {
    let mut out = String::new();
    let a = &state.assets;
    let _ = writeln!(
        out,
        "Money: {} | Influence: {} | Research points: {} | Seconds left: {}",
        a.money, a.influence, a.research_points, state.time_remaining
    );
    for (name, r) in &state.regions {
        let _ = writeln!(
            out,
            "- {}: influence {:.1}, vulnerability {:.2}, economy {:.1}",
            name, r.influence_level, r.vulnerability, r.economy
        );
    }
    out
}

/// Chat turn: the player's message with the current state as context.
pub fn chat_request(state: &SimulationState, message: &str, temperature: f32) -> GenerateRequest {
    GenerateRequest {
        system_instruction: ADVISOR_PERSONA.to_string(),
        user_context: format!(
            "Current portfolio:\n{}\nPlayer says: {}",
            describe_state(state),
            message.trim()
        ),
        temperature,
    }
}

/// Risk analysis over the regions.
pub fn risk_analysis_request(state: &SimulationState, temperature: f32) -> GenerateRequest {
    GenerateRequest {
        system_instruction: ANALYST_PERSONA.to_string(),
        user_context: format!(
            "Assess regional risk for this portfolio:\n{}",
            describe_state(state)
        ),
        temperature,
    }
}

/// Flavor commentary after an investment.
pub fn commentary_request(
    state: &SimulationState,
    what: &str,
    temperature: f32,
) -> GenerateRequest {
    GenerateRequest {
        system_instruction: ADVISOR_PERSONA.to_string(),
        user_context: format!(
            "The player just invested in {}. Comment on the move.\n{}",
            what,
            describe_state(state)
        ),
        temperature,
    }
}
