//! Storage collaborator interface and an in-memory implementation
//!
//! The engine never persists anything itself. It reads athlete histories through
//! [`AthleteStore`] and recomputes every result from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

use crate::error::{CoachError, Result};
use crate::models::{AthleteProfile, DailySample, LoadEntry};
use crate::protocols::{builtin_protocols, TrainingProtocol};

/// Read access to athlete data
pub trait AthleteStore: Send + Sync {
    /// Daily samples ordered by date, one per date
    fn list_daily_samples(&self, athlete_id: &str) -> Result<Vec<DailySample>>;

    fn list_load_entries(&self, athlete_id: &str) -> Result<Vec<LoadEntry>>;

    fn get_athlete_profile(&self, athlete_id: &str) -> Result<AthleteProfile>;

    fn list_protocols(&self) -> Result<Vec<TrainingProtocol>>;
}

/// Serialized athlete history, as exchanged with files and other services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteHistory {
    pub profile: AthleteProfile,
    #[serde(default)]
    pub daily_samples: Vec<DailySample>,
    #[serde(default)]
    pub load_entries: Vec<LoadEntry>,
}

#[derive(Debug, Clone)]
struct AthleteRecord {
    profile: AthleteProfile,
    samples: BTreeMap<NaiveDate, DailySample>,
    loads: Vec<LoadEntry>,
}

/// Thread-safe in-memory store with upsert-by-date daily samples
#[derive(Debug)]
pub struct InMemoryStore {
    athletes: RwLock<HashMap<String, AthleteRecord>>,
    protocols: Vec<TrainingProtocol>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store serving the built-in protocol catalog
    pub fn new() -> Self {
        Self::with_protocols(builtin_protocols().to_vec())
    }

    pub fn with_protocols(protocols: Vec<TrainingProtocol>) -> Self {
        Self {
            athletes: RwLock::new(HashMap::new()),
            protocols,
        }
    }

    /// Insert or replace an athlete profile, keeping existing history
    pub fn upsert_profile(&self, profile: AthleteProfile) {
        let mut athletes = self.athletes.write().unwrap_or_else(|e| e.into_inner());
        athletes
            .entry(profile.id.clone())
            .and_modify(|record| record.profile = profile.clone())
            .or_insert_with(|| AthleteRecord {
                profile,
                samples: BTreeMap::new(),
                loads: Vec::new(),
            });
    }

    /// Insert a daily sample; a later write for the same date replaces the earlier one
    pub fn upsert_daily_sample(&self, athlete_id: &str, sample: DailySample) -> Result<()> {
        let mut athletes = self.athletes.write().unwrap_or_else(|e| e.into_inner());
        let record = athletes
            .get_mut(athlete_id)
            .ok_or_else(|| CoachError::not_found("Athlete", athlete_id))?;

        if record.samples.insert(sample.date, sample).is_some() {
            debug!(athlete = athlete_id, "Replaced daily sample for existing date");
        }
        Ok(())
    }

    pub fn add_load_entry(&self, athlete_id: &str, entry: LoadEntry) -> Result<()> {
        let entry = LoadEntry::new(entry.date, entry.tss)?;
        let mut athletes = self.athletes.write().unwrap_or_else(|e| e.into_inner());
        let record = athletes
            .get_mut(athlete_id)
            .ok_or_else(|| CoachError::not_found("Athlete", athlete_id))?;
        record.loads.push(entry);
        Ok(())
    }

    /// Load a full history, applying the same upsert rules as individual writes
    pub fn import_history(&self, history: AthleteHistory) -> Result<()> {
        let athlete_id = history.profile.id.clone();
        self.upsert_profile(history.profile);
        for sample in history.daily_samples {
            self.upsert_daily_sample(&athlete_id, sample)?;
        }
        for entry in history.load_entries {
            self.add_load_entry(&athlete_id, entry)?;
        }
        Ok(())
    }

    fn with_record<T>(&self, athlete_id: &str, f: impl FnOnce(&AthleteRecord) -> T) -> Result<T> {
        let athletes = self.athletes.read().unwrap_or_else(|e| e.into_inner());
        athletes
            .get(athlete_id)
            .map(f)
            .ok_or_else(|| CoachError::not_found("Athlete", athlete_id))
    }
}

impl AthleteStore for InMemoryStore {
    fn list_daily_samples(&self, athlete_id: &str) -> Result<Vec<DailySample>> {
        self.with_record(athlete_id, |r| r.samples.values().cloned().collect())
    }

    fn list_load_entries(&self, athlete_id: &str) -> Result<Vec<LoadEntry>> {
        self.with_record(athlete_id, |r| {
            let mut loads = r.loads.clone();
            loads.sort_by_key(|e| e.date);
            loads
        })
    }

    fn get_athlete_profile(&self, athlete_id: &str) -> Result<AthleteProfile> {
        self.with_record(athlete_id, |r| r.profile.clone())
    }

    fn list_protocols(&self) -> Result<Vec<TrainingProtocol>> {
        Ok(self.protocols.clone())
    }
}
