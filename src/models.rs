use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::scores::{self, ReadinessFormula};

/// Kinds of self-report collected by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Readiness,
    Training,
    Psychological,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Readiness => "readiness",
            RecordKind::Training => "training",
            RecordKind::Psychological => "psychological",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "readiness" | "prontidao" => Ok(RecordKind::Readiness),
            "training" | "treino" => Ok(RecordKind::Training),
            "psychological" | "psych" | "psicologico" => Ok(RecordKind::Psychological),
            _ => Err(format!("Invalid record kind: {}", s)),
        }
    }
}

/// Raw morning questionnaire answers.
///
/// Ratings are on a 1-5 scale. Stress, muscle soreness and fatigue are
/// "lower is better" and get inverted before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessComponents {
    /// Subjective sleep quality (1-5)
    pub sleep_quality: u8,

    /// Hours slept (0-24)
    pub sleep_duration_hours: f64,

    /// Perceived stress (1-5, lower is better)
    pub stress: u8,

    /// Muscle soreness (1-5, lower is better)
    pub muscle_soreness: u8,

    /// Energy level (1-5)
    pub energy: u8,

    /// Motivation to train (1-5)
    pub motivation: u8,

    /// Nutrition quality (1-5)
    pub nutrition: u8,

    /// Hydration (1-5)
    pub hydration: u8,

    /// General fatigue (1-5, lower is better). Only weighted by tables that include it.
    #[serde(default)]
    pub fatigue: Option<u8>,
}

impl ReadinessComponents {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_rating("sleep_quality", self.sleep_quality, 1, 5)?;
        check_rating("stress", self.stress, 1, 5)?;
        check_rating("muscle_soreness", self.muscle_soreness, 1, 5)?;
        check_rating("energy", self.energy, 1, 5)?;
        check_rating("motivation", self.motivation, 1, 5)?;
        check_rating("nutrition", self.nutrition, 1, 5)?;
        check_rating("hydration", self.hydration, 1, 5)?;
        if let Some(fatigue) = self.fatigue {
            check_rating("fatigue", fatigue, 1, 5)?;
        }
        check_range("sleep_duration_hours", self.sleep_duration_hours, 0.0, 24.0)
    }
}

/// A validated readiness self-report with its derived score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReadinessRecordRaw")]
pub struct ReadinessRecord {
    date: NaiveDate,
    #[serde(flatten)]
    components: ReadinessComponents,
    score: u8,
}

#[derive(Deserialize)]
struct ReadinessRecordRaw {
    date: NaiveDate,
    #[serde(flatten)]
    components: ReadinessComponents,
}

impl TryFrom<ReadinessRecordRaw> for ReadinessRecord {
    type Error = ValidationError;

    fn try_from(raw: ReadinessRecordRaw) -> Result<Self, Self::Error> {
        ReadinessRecord::new(raw.date, raw.components)
    }
}

impl ReadinessRecord {
    /// Validate the components and score them with the canonical formula
    pub fn new(date: NaiveDate, components: ReadinessComponents) -> Result<Self, ValidationError> {
        Self::with_formula(date, components, &ReadinessFormula::default())
    }

    /// Validate the components and score them with a specific formula version
    pub fn with_formula(
        date: NaiveDate,
        components: ReadinessComponents,
        formula: &ReadinessFormula,
    ) -> Result<Self, ValidationError> {
        components.validate()?;
        let score = scores::readiness_score(&components, formula);
        Ok(Self {
            date,
            components,
            score,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn components(&self) -> &ReadinessComponents {
        &self.components
    }

    /// Readiness score (0-100)
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Recompute the score under another formula version
    pub fn rescored(&self, formula: &ReadinessFormula) -> Self {
        Self {
            date: self.date,
            components: self.components.clone(),
            score: scores::readiness_score(&self.components, formula),
        }
    }
}

/// A validated training session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrainingRecordRaw")]
pub struct TrainingRecord {
    date: NaiveDate,
    duration_minutes: f64,
    rpe: f64,
}

#[derive(Deserialize)]
struct TrainingRecordRaw {
    date: NaiveDate,
    duration_minutes: f64,
    rpe: f64,
}

impl TryFrom<TrainingRecordRaw> for TrainingRecord {
    type Error = ValidationError;

    fn try_from(raw: TrainingRecordRaw) -> Result<Self, Self::Error> {
        TrainingRecord::new(raw.date, raw.duration_minutes, raw.rpe)
    }
}

impl TrainingRecord {
    pub fn new(date: NaiveDate, duration_minutes: f64, rpe: f64) -> Result<Self, ValidationError> {
        if !duration_minutes.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "duration_minutes",
            });
        }
        if duration_minutes <= 0.0 {
            return Err(ValidationError::NonPositiveDuration {
                minutes: duration_minutes,
            });
        }
        check_range("rpe", rpe, 0.0, 10.0)?;

        Ok(Self {
            date,
            duration_minutes,
            rpe,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    /// Session rating of perceived exertion (0-10)
    pub fn rpe(&self) -> f64 {
        self.rpe
    }

    /// Training impulse: duration x RPE
    pub fn trimp(&self) -> f64 {
        scores::trimp(self.duration_minutes, self.rpe)
    }

    /// Session-RPE training stress score at full precision
    pub fn tss(&self) -> f64 {
        scores::tss(self.duration_minutes, self.rpe)
    }
}

/// A validated psychological check-in (DASS triplet plus mood)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PsychologicalRecordRaw")]
pub struct PsychologicalRecord {
    date: NaiveDate,
    anxiety: u8,
    depression: u8,
    stress: u8,
    mood: u8,
}

#[derive(Deserialize)]
struct PsychologicalRecordRaw {
    date: NaiveDate,
    anxiety: u8,
    depression: u8,
    stress: u8,
    mood: u8,
}

impl TryFrom<PsychologicalRecordRaw> for PsychologicalRecord {
    type Error = ValidationError;

    fn try_from(raw: PsychologicalRecordRaw) -> Result<Self, Self::Error> {
        PsychologicalRecord::new(raw.date, raw.anxiety, raw.depression, raw.stress, raw.mood)
    }
}

impl PsychologicalRecord {
    pub fn new(
        date: NaiveDate,
        anxiety: u8,
        depression: u8,
        stress: u8,
        mood: u8,
    ) -> Result<Self, ValidationError> {
        check_rating("anxiety", anxiety, 0, 3)?;
        check_rating("depression", depression, 0, 3)?;
        check_rating("dass_stress", stress, 0, 3)?;
        check_rating("mood", mood, 1, 5)?;

        Ok(Self {
            date,
            anxiety,
            depression,
            stress,
            mood,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn anxiety(&self) -> u8 {
        self.anxiety
    }

    pub fn depression(&self) -> u8 {
        self.depression
    }

    pub fn stress(&self) -> u8 {
        self.stress
    }

    pub fn mood(&self) -> u8 {
        self.mood
    }

    /// DASS score (0-100, higher is better)
    pub fn dass_score(&self) -> u8 {
        scores::dass_score(self.anxiety, self.depression, self.stress)
    }
}

/// Any self-report, as exchanged with the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Readiness(ReadinessRecord),
    Training(TrainingRecord),
    Psychological(PsychologicalRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Readiness(_) => RecordKind::Readiness,
            Record::Training(_) => RecordKind::Training,
            Record::Psychological(_) => RecordKind::Psychological,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Record::Readiness(r) => r.date(),
            Record::Training(t) => t.date(),
            Record::Psychological(p) => p.date(),
        }
    }
}

impl From<ReadinessRecord> for Record {
    fn from(record: ReadinessRecord) -> Self {
        Record::Readiness(record)
    }
}

impl From<TrainingRecord> for Record {
    fn from(record: TrainingRecord) -> Self {
        Record::Training(record)
    }
}

impl From<PsychologicalRecord> for Record {
    fn from(record: PsychologicalRecord) -> Self {
        Record::Psychological(record)
    }
}

fn check_rating(field: &'static str, value: u8, min: u8, max: u8) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
