//! Cross-module correlator
//!
//! Inner-joins the readiness, training and psychological daily series on
//! date and correlates every column against every other. Only dates present
//! in all attached modules contribute. Training is dense (rest days are real
//! zero-load days), readiness and psychological days count only when observed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::RecordKind;
use crate::normalizer::{DailySeries, PsychologicalDay, ReadinessDay};
use crate::pmc::DailyLoadRecord;
use crate::statistics::{self, CorrelationMatrix, CorrelationMethod};

/// Columns contributed by one module, keyed by date
#[derive(Debug, Clone)]
struct ModuleTable {
    kind: RecordKind,
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<f64>>,
}

impl ModuleTable {
    fn new(kind: RecordKind, prefix: &str, names: &[&str]) -> Self {
        ModuleTable {
            kind,
            columns: names.iter().map(|n| format!("{}_{}", prefix, n)).collect(),
            rows: BTreeMap::new(),
        }
    }
}

/// Date-aligned columns after the inner join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<(String, Vec<f64>)>,
}

impl AlignedFrame {
    /// True when the attached modules share no date
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// Result of a correlation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    /// Dates that survived the join
    pub joined_days: usize,
    pub matrix: CorrelationMatrix,
    /// Columns most correlated with the target, strongest first
    pub top: Vec<(String, f64)>,
    pub target: String,
}

/// Collects module series and correlates them across modules
#[derive(Debug, Clone)]
pub struct CrossModuleCorrelator {
    method: CorrelationMethod,
    min_samples: usize,
    tables: Vec<ModuleTable>,
}

impl CrossModuleCorrelator {
    pub fn new(method: CorrelationMethod) -> Self {
        CrossModuleCorrelator {
            method,
            min_samples: statistics::MIN_CORRELATION_SAMPLES,
            tables: Vec::new(),
        }
    }

    /// Fewest shared days a column pair needs (never below 2)
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples.max(statistics::MIN_CORRELATION_SAMPLES);
        self
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    fn attach(mut self, table: ModuleTable) -> Self {
        self.tables.retain(|t| t.kind != table.kind);
        self.tables.push(table);
        self
    }

    pub fn with_readiness(self, series: &DailySeries<ReadinessDay>) -> Self {
        let mut table = ModuleTable::new(
            RecordKind::Readiness,
            "readiness",
            &[
                "score",
                "sleep_quality",
                "sleep_duration",
                "stress",
                "fatigue",
                "muscle_soreness",
                "energy",
                "motivation",
            ],
        );
        for day in series.observed() {
            table.rows.insert(
                day.date,
                vec![
                    day.score,
                    day.sleep_quality,
                    day.sleep_duration_hours,
                    day.stress,
                    day.fatigue.unwrap_or(f64::NAN),
                    day.muscle_soreness,
                    day.energy,
                    day.motivation,
                ],
            );
        }
        self.attach(table)
    }

    pub fn with_training(self, loads: &[DailyLoadRecord]) -> Self {
        let mut table = ModuleTable::new(
            RecordKind::Training,
            "training",
            &["trimp", "tss", "ctl", "atl", "tsb", "monotony", "strain"],
        );
        for record in loads {
            let load = &record.load;
            table.rows.insert(
                record.date,
                vec![
                    record.trimp,
                    load.tss,
                    load.ctl,
                    load.atl,
                    load.tsb,
                    load.monotony.unwrap_or(f64::NAN),
                    load.strain.unwrap_or(f64::NAN),
                ],
            );
        }
        self.attach(table)
    }

    pub fn with_psychological(self, series: &DailySeries<PsychologicalDay>) -> Self {
        let mut table = ModuleTable::new(
            RecordKind::Psychological,
            "psych",
            &[
                "dass_score",
                "dass_anxiety",
                "dass_depression",
                "dass_stress",
                "mood",
            ],
        );
        for day in series.observed() {
            table.rows.insert(
                day.date,
                vec![day.dass_score, day.anxiety, day.depression, day.stress, day.mood],
            );
        }
        self.attach(table)
    }

    /// Inner join of every attached module on date
    pub fn align(&self) -> AlignedFrame {
        let Some((first, rest)) = self.tables.split_first() else {
            return AlignedFrame {
                dates: Vec::new(),
                columns: Vec::new(),
            };
        };

        let dates: Vec<NaiveDate> = first
            .rows
            .keys()
            .filter(|date| rest.iter().all(|t| t.rows.contains_key(date)))
            .copied()
            .collect();

        let mut columns = Vec::new();
        for table in &self.tables {
            for (idx, name) in table.columns.iter().enumerate() {
                let values = dates
                    .iter()
                    .map(|date| table.rows.get(date).map_or(f64::NAN, |row| row[idx]))
                    .collect();
                columns.push((name.clone(), values));
            }
        }

        debug!(
            modules = self.tables.len(),
            joined_days = dates.len(),
            "module series aligned"
        );
        AlignedFrame { dates, columns }
    }

    pub fn correlation_matrix(&self) -> CorrelationMatrix {
        statistics::correlation_matrix(&self.align().columns, self.method, self.min_samples)
    }

    /// Matrix plus the `k` columns most correlated with `target`.
    /// An empty join yields an all-`None` matrix and no top entries.
    pub fn report(&self, target: &str, k: usize) -> CorrelationReport {
        let frame = self.align();
        let matrix = statistics::correlation_matrix(&frame.columns, self.method, self.min_samples);
        let top = matrix.top_correlated(target, k);
        CorrelationReport {
            joined_days: frame.len(),
            matrix,
            top,
            target: target.to_string(),
        }
    }
}
