//! Training protocol catalog
//!
//! Protocols are read-only reference data. The built-in catalog is built once on
//! first use; deployments can ship their own catalog as a TOML file with one
//! `[[protocol]]` table per entry.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use crate::error::{CoachError, Result};
use crate::models::{ExperienceLevel, WorkoutType};
use crate::readiness::HrvStatus;

/// Longest weekend ride a catalog may ask for
pub const MAX_LONG_RIDE_MINUTES: u32 = 600;

/// Training philosophy behind a protocol, drives midweek session types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Polarized,
    SweetSpot,
    Threshold,
    Vo2Max,
    BaseEndurance,
}

/// Share of weekly time per intensity band, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDistribution {
    pub low: Decimal,
    pub moderate: Decimal,
    pub high: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProtocol {
    pub id: String,
    pub name: String,
    pub kind: ProtocolKind,
    pub min_tsb: Decimal,
    pub max_tsb: Decimal,
    pub required_hrv_status: Vec<HrvStatus>,
    pub min_readiness: u8,
    pub experience_level: Vec<ExperienceLevel>,
    pub zone_distribution: ZoneDistribution,
    pub sessions_per_week: u32,
    /// Weekly TSS targets for weeks 1-4; later weeks reuse the last entry
    pub tss_progression: [Decimal; 4],
    pub long_ride_minutes: u32,
    pub expected_adaptations: Vec<String>,
}

impl TrainingProtocol {
    /// Weekly TSS target for a 1-indexed week
    pub fn target_tss(&self, week: u32) -> Decimal {
        let stage = week.clamp(1, 4) as usize - 1;
        self.tss_progression[stage]
    }

    /// Session type for the n-th (0-indexed) non-weekend session of a build week
    pub fn midweek_workout_type(&self, slot: usize) -> WorkoutType {
        match self.kind {
            ProtocolKind::Polarized if slot == 0 => WorkoutType::VO2Max,
            ProtocolKind::Polarized => WorkoutType::Endurance,
            ProtocolKind::SweetSpot | ProtocolKind::Threshold if slot < 2 => {
                WorkoutType::Threshold
            }
            ProtocolKind::Vo2Max if slot < 2 => WorkoutType::VO2Max,
            ProtocolKind::Vo2Max if slot == 2 => WorkoutType::Threshold,
            _ => WorkoutType::Endurance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoachError::Configuration(
                "protocol id must not be empty".to_string(),
            ));
        }
        if self.min_tsb > self.max_tsb {
            return Err(CoachError::Configuration(format!(
                "protocol {}: min_tsb {} exceeds max_tsb {}",
                self.id, self.min_tsb, self.max_tsb
            )));
        }
        if self.sessions_per_week == 0 || self.sessions_per_week > 6 {
            return Err(CoachError::Configuration(format!(
                "protocol {}: sessions_per_week must be between 1 and 6",
                self.id
            )));
        }
        if self.long_ride_minutes == 0 || self.long_ride_minutes > MAX_LONG_RIDE_MINUTES {
            return Err(CoachError::Configuration(format!(
                "protocol {}: long_ride_minutes must be between 1 and {}",
                self.id, MAX_LONG_RIDE_MINUTES
            )));
        }
        if self.min_readiness > 100 {
            return Err(CoachError::Configuration(format!(
                "protocol {}: min_readiness must be at most 100",
                self.id
            )));
        }
        Ok(())
    }
}

fn adaptations(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

static BUILTIN_PROTOCOLS: LazyLock<Vec<TrainingProtocol>> = LazyLock::new(|| {
    use ExperienceLevel::*;
    use HrvStatus::*;

    vec![
        TrainingProtocol {
            id: "polarized_80_20".to_string(),
            name: "Polarized 80/20".to_string(),
            kind: ProtocolKind::Polarized,
            min_tsb: dec!(-10),
            max_tsb: dec!(25),
            required_hrv_status: vec![Green, Yellow],
            min_readiness: 60,
            experience_level: vec![Intermediate, Advanced, Elite],
            zone_distribution: ZoneDistribution {
                low: dec!(80),
                moderate: dec!(0),
                high: dec!(20),
            },
            sessions_per_week: 5,
            tss_progression: [dec!(350), dec!(400), dec!(450), dec!(300)],
            long_ride_minutes: 180,
            expected_adaptations: adaptations(&[
                "Improved aerobic efficiency",
                "Higher VO2max",
                "Better fatigue resistance",
            ]),
        },
        TrainingProtocol {
            id: "sweet_spot_base".to_string(),
            name: "Sweet Spot Base".to_string(),
            kind: ProtocolKind::SweetSpot,
            min_tsb: dec!(-20),
            max_tsb: dec!(10),
            required_hrv_status: vec![Green, Yellow],
            min_readiness: 50,
            experience_level: vec![Beginner, Intermediate, Advanced, Elite],
            zone_distribution: ZoneDistribution {
                low: dec!(60),
                moderate: dec!(35),
                high: dec!(5),
            },
            sessions_per_week: 4,
            tss_progression: [dec!(300), dec!(350), dec!(400), dec!(250)],
            long_ride_minutes: 150,
            expected_adaptations: adaptations(&[
                "Raised FTP",
                "Time-efficient aerobic development",
            ]),
        },
        TrainingProtocol {
            id: "threshold_block".to_string(),
            name: "Threshold Block".to_string(),
            kind: ProtocolKind::Threshold,
            min_tsb: dec!(-5),
            max_tsb: dec!(20),
            required_hrv_status: vec![Green],
            min_readiness: 70,
            experience_level: vec![Intermediate, Advanced, Elite],
            zone_distribution: ZoneDistribution {
                low: dec!(70),
                moderate: dec!(20),
                high: dec!(10),
            },
            sessions_per_week: 4,
            tss_progression: [dec!(380), dec!(430), dec!(480), dec!(300)],
            long_ride_minutes: 150,
            expected_adaptations: adaptations(&[
                "Higher sustainable power at threshold",
                "Improved lactate clearance",
            ]),
        },
        TrainingProtocol {
            id: "vo2max_block".to_string(),
            name: "VO2max Block".to_string(),
            kind: ProtocolKind::Vo2Max,
            min_tsb: dec!(0),
            max_tsb: dec!(25),
            required_hrv_status: vec![Green],
            min_readiness: 75,
            experience_level: vec![Advanced, Elite],
            zone_distribution: ZoneDistribution {
                low: dec!(75),
                moderate: dec!(5),
                high: dec!(20),
            },
            sessions_per_week: 4,
            tss_progression: [dec!(350), dec!(400), dec!(420), dec!(280)],
            long_ride_minutes: 120,
            expected_adaptations: adaptations(&[
                "Higher maximal aerobic power",
                "Improved repeatability of hard efforts",
            ]),
        },
        TrainingProtocol {
            id: "base_endurance".to_string(),
            name: "Base Endurance Rebuild".to_string(),
            kind: ProtocolKind::BaseEndurance,
            min_tsb: dec!(-50),
            max_tsb: dec!(5),
            required_hrv_status: vec![Green, Yellow, Red],
            min_readiness: 0,
            experience_level: vec![Beginner, Intermediate, Advanced, Elite],
            zone_distribution: ZoneDistribution {
                low: dec!(90),
                moderate: dec!(10),
                high: dec!(0),
            },
            sessions_per_week: 3,
            tss_progression: [dec!(200), dec!(240), dec!(260), dec!(180)],
            long_ride_minutes: 120,
            expected_adaptations: adaptations(&[
                "Restored autonomic balance",
                "Rebuilt aerobic base",
            ]),
        },
    ]
});

/// Built-in protocol catalog
pub fn builtin_protocols() -> &'static [TrainingProtocol] {
    &BUILTIN_PROTOCOLS
}

/// Look up a built-in protocol by id
pub fn find_protocol(id: &str) -> Result<&'static TrainingProtocol> {
    BUILTIN_PROTOCOLS
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| CoachError::not_found("Protocol", id))
}

#[derive(Debug, Deserialize, Serialize)]
struct ProtocolFile {
    #[serde(default)]
    protocol: Vec<TrainingProtocol>,
}

/// Parse and validate a TOML protocol catalog
pub fn parse_protocols(content: &str) -> Result<Vec<TrainingProtocol>> {
    let file: ProtocolFile = toml::from_str(content)
        .map_err(|e| CoachError::Configuration(format!("invalid protocol catalog: {}", e)))?;

    let mut seen = HashSet::new();
    for protocol in &file.protocol {
        protocol.validate()?;
        if !seen.insert(protocol.id.as_str()) {
            return Err(CoachError::Configuration(format!(
                "duplicate protocol id {}",
                protocol.id
            )));
        }
    }

    Ok(file.protocol)
}

/// Load a protocol catalog from a TOML file
pub fn load_protocols<P: AsRef<Path>>(path: P) -> Result<Vec<TrainingProtocol>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let protocols = parse_protocols(&content)?;
    info!(
        path = %path.as_ref().display(),
        count = protocols.len(),
        "Loaded protocol catalog"
    );
    Ok(protocols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let protocols = builtin_protocols();
        assert_eq!(protocols.len(), 5);
        for protocol in protocols {
            protocol.validate().unwrap();
            let total = protocol.zone_distribution.low
                + protocol.zone_distribution.moderate
                + protocol.zone_distribution.high;
            assert_eq!(total, dec!(100), "{}", protocol.id);
        }
    }

    #[test]
    fn test_find_protocol() {
        assert_eq!(find_protocol("threshold_block").unwrap().sessions_per_week, 4);
        let err = find_protocol("unknown").unwrap_err();
        assert!(matches!(err, CoachError::NotFound { .. }));
    }

    #[test]
    fn test_target_tss_recycles_last_stage() {
        let protocol = find_protocol("polarized_80_20").unwrap();
        assert_eq!(protocol.target_tss(1), dec!(350));
        assert_eq!(protocol.target_tss(4), dec!(300));
        assert_eq!(protocol.target_tss(7), dec!(300));
    }

    #[test]
    fn test_midweek_rules() {
        let polarized = find_protocol("polarized_80_20").unwrap();
        assert_eq!(polarized.midweek_workout_type(0), WorkoutType::VO2Max);
        assert_eq!(polarized.midweek_workout_type(1), WorkoutType::Endurance);

        let vo2 = find_protocol("vo2max_block").unwrap();
        assert_eq!(vo2.midweek_workout_type(1), WorkoutType::VO2Max);
        assert_eq!(vo2.midweek_workout_type(2), WorkoutType::Threshold);

        let base = find_protocol("base_endurance").unwrap();
        assert_eq!(base.midweek_workout_type(0), WorkoutType::Endurance);
    }

    #[test]
    fn test_load_protocols_from_toml() {
        let toml_content = r#"
[[protocol]]
id = "custom_block"
name = "Custom Block"
kind = "threshold"
min_tsb = -15
max_tsb = 15
required_hrv_status = ["GREEN", "YELLOW"]
min_readiness = 55
experience_level = ["intermediate", "advanced"]
sessions_per_week = 4
tss_progression = [320, 360, 400, 260]
long_ride_minutes = 150
expected_adaptations = ["FTP"]

[protocol.zone_distribution]
low = 70
moderate = 25
high = 5
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let protocols = load_protocols(file.path()).unwrap();
        assert_eq!(protocols.len(), 1);
        assert_eq!(protocols[0].kind, ProtocolKind::Threshold);
        assert_eq!(protocols[0].min_tsb, dec!(-15));
        assert_eq!(protocols[0].target_tss(2), dec!(360));
    }

    #[test]
    fn test_invalid_catalog_is_rejected() {
        let content = r#"
[[protocol]]
id = "broken"
name = "Broken"
kind = "polarized"
min_tsb = 10
max_tsb = -10
required_hrv_status = ["GREEN"]
min_readiness = 50
experience_level = ["elite"]
sessions_per_week = 4
tss_progression = [1, 2, 3, 4]
long_ride_minutes = 60
expected_adaptations = []
zone_distribution = { low = 80, moderate = 0, high = 20 }
"#;
        let err = parse_protocols(content).unwrap_err();
        assert!(matches!(err, CoachError::Configuration(_)));
    }

    fn catalog_entry(id: &str, kind: &str, long_ride_minutes: u32) -> String {
        format!(
            r#"
[[protocol]]
id = "{id}"
name = "{id} block"
kind = "{kind}"
min_tsb = -10
max_tsb = 10
required_hrv_status = ["GREEN"]
min_readiness = 50
experience_level = ["advanced"]
sessions_per_week = 4
tss_progression = [300, 340, 380, 240]
long_ride_minutes = {long_ride_minutes}
expected_adaptations = []
zone_distribution = {{ low = 80, moderate = 0, high = 20 }}
"#
        )
    }

    #[test]
    fn test_long_ride_duration_is_bounded() {
        assert!(parse_protocols(&catalog_entry("ok", "polarized", 240)).is_ok());
        assert!(parse_protocols(&catalog_entry("max", "polarized", MAX_LONG_RIDE_MINUTES)).is_ok());

        for minutes in [0, MAX_LONG_RIDE_MINUTES + 1, 80_000_000] {
            let err = parse_protocols(&catalog_entry("bad", "polarized", minutes)).unwrap_err();
            assert!(
                matches!(err, CoachError::Configuration(_)),
                "{} minutes accepted",
                minutes
            );
        }
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let content = catalog_entry("dup", "polarized", 180) + &catalog_entry("dup", "sweet_spot", 150);
        let err = parse_protocols(&content).unwrap_err();
        match err {
            CoachError::Configuration(message) => assert!(message.contains("dup")),
            other => panic!("unexpected error: {:?}", other),
        }

        let content = catalog_entry("one", "polarized", 180) + &catalog_entry("two", "sweet_spot", 150);
        assert_eq!(parse_protocols(&content).unwrap().len(), 2);
    }
}
