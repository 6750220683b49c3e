use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::AthleteAnalysis;
use crate::error::{CoachError, Result};
use crate::protocols::TrainingProtocol;

const TSB_MATCH: i32 = 30;
const HRV_MATCH: i32 = 25;
const HRV_MISMATCH: i32 = -20;
const READINESS_MATCH: i32 = 25;
const READINESS_MISMATCH: i32 = -15;
const EXPERIENCE_MATCH: i32 = 20;

/// Suitability of one protocol for the athlete's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolScore {
    pub protocol_id: String,
    pub protocol_name: String,
    /// Clamped to 0-100
    pub score: u8,
    pub reasons: Vec<String>,
}

impl ProtocolScore {
    pub fn rationale(&self) -> String {
        format!(
            "{} scores {}/100: {}.",
            self.protocol_name,
            self.score,
            self.reasons.join("; ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProtocol {
    pub label: String,
    pub protocol: TrainingProtocol,
    pub score: u8,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRecommendation {
    pub primary: RankedProtocol,
    /// Up to two runner-up protocols
    pub alternatives: Vec<RankedProtocol>,
}

/// Score a protocol against the athlete snapshot
pub fn score(protocol: &TrainingProtocol, analysis: &AthleteAnalysis) -> ProtocolScore {
    let mut total = 0;
    let mut reasons = Vec::new();

    let tsb = analysis.pmc.tsb;
    if tsb >= protocol.min_tsb && tsb <= protocol.max_tsb {
        total += TSB_MATCH;
        reasons.push(format!(
            "form (TSB {}) is within {} to {}",
            tsb, protocol.min_tsb, protocol.max_tsb
        ));
    } else {
        reasons.push(format!(
            "form (TSB {}) is outside {} to {}",
            tsb, protocol.min_tsb, protocol.max_tsb
        ));
    }

    if protocol.required_hrv_status.contains(&analysis.hrv.status) {
        total += HRV_MATCH;
        reasons.push(format!("HRV status {} is suitable", analysis.hrv.status));
    } else {
        total += HRV_MISMATCH;
        reasons.push(format!("HRV status {} is not suitable", analysis.hrv.status));
    }

    if analysis.readiness.score >= protocol.min_readiness {
        total += READINESS_MATCH;
        reasons.push(format!(
            "readiness {} meets the minimum of {}",
            analysis.readiness.score, protocol.min_readiness
        ));
    } else {
        total += READINESS_MISMATCH;
        reasons.push(format!(
            "readiness {} is below the minimum of {}",
            analysis.readiness.score, protocol.min_readiness
        ));
    }

    if protocol
        .experience_level
        .contains(&analysis.profile.experience)
    {
        total += EXPERIENCE_MATCH;
        reasons.push(format!(
            "suited to {} riders",
            analysis.profile.experience
        ));
    }

    ProtocolScore {
        protocol_id: protocol.id.clone(),
        protocol_name: protocol.name.clone(),
        score: total.clamp(0, 100) as u8,
        reasons,
    }
}

/// Score every protocol, best first. Ties keep catalog order.
pub fn rank(protocols: &[TrainingProtocol], analysis: &AthleteAnalysis) -> Vec<ProtocolScore> {
    ranked_pairs(protocols, analysis)
        .into_iter()
        .map(|(_, s)| s)
        .collect()
}

// Each score stays paired with the protocol it was computed from
fn ranked_pairs<'a>(
    protocols: &'a [TrainingProtocol],
    analysis: &AthleteAnalysis,
) -> Vec<(&'a TrainingProtocol, ProtocolScore)> {
    let mut pairs: Vec<_> = protocols.iter().map(|p| (p, score(p, analysis))).collect();
    pairs.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    pairs
}

/// Primary protocol plus two labeled alternatives
pub fn recommend(
    protocols: &[TrainingProtocol],
    analysis: &AthleteAnalysis,
) -> Result<ProtocolRecommendation> {
    let mut entries = ranked_pairs(protocols, analysis)
        .into_iter()
        .take(3)
        .enumerate()
        .map(|(idx, (protocol, s))| {
            let label = match idx {
                0 => "Primary".to_string(),
                n => format!("Alternative {}", n),
            };
            RankedProtocol {
                label,
                rationale: s.rationale(),
                score: s.score,
                protocol: protocol.clone(),
            }
        });

    let primary = entries
        .next()
        .ok_or_else(|| CoachError::not_found("Protocol", "any"))?;
    let alternatives: Vec<RankedProtocol> = entries.collect();

    info!(
        athlete = %analysis.athlete_id,
        protocol = %primary.protocol.id,
        score = primary.score,
        "Protocol recommended"
    );

    Ok(ProtocolRecommendation {
        primary,
        alternatives,
    })
}
