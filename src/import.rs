//! CSV import for readiness, training and psychological logs
//!
//! Headers are matched case-insensitively through an alias table covering
//! the English and Portuguese column names used by the dashboard exports.
//! Rows that fail to parse or validate are skipped and counted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ImportError, Result};
use crate::models::{PsychologicalRecord, ReadinessComponents, ReadinessRecord, TrainingRecord};
use crate::scores::ReadinessFormula;

/// Row counts of one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: usize,
}

/// Imported records, ascending by date
#[derive(Debug, Clone, PartialEq)]
pub struct Imported<T> {
    pub records: Vec<T>,
    pub summary: ImportSummary,
}

/// One CSV row keyed by standard column name
struct Row<'a> {
    fields: HashMap<&'a str, &'a str>,
}

impl Row<'_> {
    fn text(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn number(&self, column: &str) -> std::result::Result<f64, String> {
        let raw = self
            .text(column)
            .ok_or_else(|| format!("missing value for {}", column))?;
        raw.replace(',', ".")
            .parse::<f64>()
            .map_err(|_| format!("{} is not a number: {}", column, raw))
    }

    fn rating(&self, column: &str) -> std::result::Result<u8, String> {
        let value = self.number(column)?;
        if value.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&value) {
            return Err(format!("{} is not a whole rating: {}", column, value));
        }
        Ok(value as u8)
    }

    fn optional_rating(&self, column: &str) -> std::result::Result<Option<u8>, String> {
        match self.text(column) {
            Some(_) => self.rating(column).map(Some),
            None => Ok(None),
        }
    }

    fn date(&self) -> std::result::Result<NaiveDate, String> {
        let raw = self.text("date").ok_or("missing date")?;
        parse_date(raw).map_err(|e| e.to_string())
    }
}

/// Parse `%Y-%m-%d`, `%d/%m/%Y`, `%Y-%m-%d %H:%M:%S` or RFC3339 into a calendar date
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, ImportError> {
    let value = value.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.date());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }
    Err(ImportError::InvalidDate {
        value: value.to_string(),
    })
}

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, &'static str>,
    formula: ReadinessFormula,
}

impl CsvImporter {
    pub fn new() -> Self {
        Self::with_formula(ReadinessFormula::default())
    }

    /// Importer that scores readiness rows with `formula`
    pub fn with_formula(formula: ReadinessFormula) -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "date", &["date", "data", "day", "dia", "timestamp"]);
        Self::add_mapping(
            &mut column_mapping,
            "sleep_quality",
            &["sleep_quality", "sleep", "qualidade_sono", "qualidade_do_sono"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_duration",
            &["sleep_duration", "sleep_hours", "hours_slept", "horas_sono", "duracao_sono"],
        );
        Self::add_mapping(&mut column_mapping, "stress", &["stress", "estresse", "stress_level"]);
        Self::add_mapping(
            &mut column_mapping,
            "muscle_soreness",
            &["muscle_soreness", "soreness", "dor_muscular"],
        );
        Self::add_mapping(&mut column_mapping, "energy", &["energy", "energia"]);
        Self::add_mapping(&mut column_mapping, "motivation", &["motivation", "motivacao"]);
        Self::add_mapping(&mut column_mapping, "nutrition", &["nutrition", "nutricao", "alimentacao"]);
        Self::add_mapping(&mut column_mapping, "hydration", &["hydration", "hidratacao"]);
        Self::add_mapping(&mut column_mapping, "fatigue", &["fatigue", "fadiga", "cansaco"]);
        Self::add_mapping(
            &mut column_mapping,
            "duration",
            &["duration", "duration_minutes", "minutes", "duracao", "tempo"],
        );
        Self::add_mapping(&mut column_mapping, "rpe", &["rpe", "pse", "session_rpe", "intensity"]);
        Self::add_mapping(
            &mut column_mapping,
            "anxiety",
            &["anxiety", "dass_anxiety", "ansiedade"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "depression",
            &["depression", "dass_depression", "depressao"],
        );
        Self::add_mapping(&mut column_mapping, "dass_stress", &["dass_stress", "estresse_dass"]);
        Self::add_mapping(&mut column_mapping, "mood", &["mood", "humor"]);

        Self {
            column_mapping,
            formula,
        }
    }

    fn add_mapping(
        mapping: &mut HashMap<String, &'static str>,
        standard: &'static str,
        variations: &[&str],
    ) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard);
        }
    }

    /// Standard name for a header, or the cleaned header itself
    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .map(|s| s.to_string())
            .unwrap_or(normalized)
    }

    pub fn import_readiness<P: AsRef<Path>>(&self, path: P) -> Result<Imported<ReadinessRecord>> {
        self.import_file(
            path.as_ref(),
            &[
                "date",
                "sleep_quality",
                "sleep_duration",
                "stress",
                "muscle_soreness",
                "energy",
                "motivation",
                "nutrition",
                "hydration",
            ],
            |row| self.readiness_from_row(row),
            ReadinessRecord::date,
        )
    }

    pub fn import_training<P: AsRef<Path>>(&self, path: P) -> Result<Imported<TrainingRecord>> {
        self.import_file(
            path.as_ref(),
            &["date", "duration", "rpe"],
            Self::training_from_row,
            TrainingRecord::date,
        )
    }

    pub fn import_psychological<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Imported<PsychologicalRecord>> {
        self.import_file(
            path.as_ref(),
            &["date", "anxiety", "depression", "dass_stress", "mood"],
            Self::psychological_from_row,
            PsychologicalRecord::date,
        )
    }

    fn readiness_from_row(&self, row: &Row) -> std::result::Result<ReadinessRecord, String> {
        let components = ReadinessComponents {
            sleep_quality: row.rating("sleep_quality")?,
            sleep_duration_hours: row.number("sleep_duration")?,
            stress: row.rating("stress")?,
            muscle_soreness: row.rating("muscle_soreness")?,
            energy: row.rating("energy")?,
            motivation: row.rating("motivation")?,
            nutrition: row.rating("nutrition")?,
            hydration: row.rating("hydration")?,
            fatigue: row.optional_rating("fatigue")?,
        };
        ReadinessRecord::with_formula(row.date()?, components, &self.formula)
            .map_err(|e| e.to_string())
    }

    fn training_from_row(row: &Row) -> std::result::Result<TrainingRecord, String> {
        TrainingRecord::new(row.date()?, row.number("duration")?, row.number("rpe")?)
            .map_err(|e| e.to_string())
    }

    fn psychological_from_row(row: &Row) -> std::result::Result<PsychologicalRecord, String> {
        PsychologicalRecord::new(
            row.date()?,
            row.rating("anxiety")?,
            row.rating("depression")?,
            row.rating("dass_stress")?,
            row.rating("mood")?,
        )
        .map_err(|e| e.to_string())
    }

    fn import_file<T, B, D>(
        &self,
        path: &Path,
        required: &[&str],
        build: B,
        date_of: D,
    ) -> Result<Imported<T>>
    where
        B: Fn(&Row) -> std::result::Result<T, String>,
        D: Fn(&T) -> NaiveDate,
    {
        if !path.exists() {
            return Err(ImportError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let file = std::fs::File::open(path)?;
        self.import_reader(file, path, required, build, date_of)
    }

    fn import_reader<R, T, B, D>(
        &self,
        reader: R,
        path: &Path,
        required: &[&str],
        build: B,
        date_of: D,
    ) -> Result<Imported<T>>
    where
        R: io::Read,
        B: Fn(&Row) -> std::result::Result<T, String>,
        D: Fn(&T) -> NaiveDate,
    {
        let csv_error = |source: csv::Error| ImportError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| self.normalize_column_name(h))
            .collect();

        for column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                }
                .into());
            }
        }

        let mut records = Vec::new();
        let mut summary = ImportSummary::default();
        let mut raw = StringRecord::new();
        let mut line = 1usize;

        while reader.read_record(&mut raw).map_err(csv_error)? {
            line += 1;
            let row = Row {
                fields: headers
                    .iter()
                    .map(String::as_str)
                    .zip(raw.iter())
                    .collect(),
            };
            match build(&row) {
                Ok(record) => {
                    records.push(record);
                    summary.imported += 1;
                }
                Err(reason) => {
                    warn!(path = %path.display(), line, %reason, "skipping CSV row");
                    summary.rejected += 1;
                }
            }
        }

        records.sort_by_key(|r| date_of(r));
        debug!(
            path = %path.display(),
            imported = summary.imported,
            rejected = summary.rejected,
            "CSV import finished"
        );
        Ok(Imported { records, summary })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AthleteMonitorError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(parse_date("2024-03-07").unwrap(), expected);
        assert_eq!(parse_date("07/03/2024").unwrap(), expected);
        assert_eq!(parse_date("2024-03-07T06:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_date("2024-03-07 06:30:00").unwrap(), expected);
        assert!(matches!(
            parse_date("March 7th"),
            Err(ImportError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_training_import_sorted_with_rejections() {
        let file = csv_file(
            "Date,Duration,RPE\n\
             2024-03-09,60,7\n\
             2024-03-07,45,5\n\
             2024-03-08,0,5\n\
             2024-03-10,30,eleven\n\
             2024-03-11,30,11\n",
        );
        let imported = CsvImporter::new().import_training(file.path()).unwrap();

        assert_eq!(imported.summary, ImportSummary { imported: 2, rejected: 3 });
        assert_eq!(
            imported.records[0].date(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
        );
        assert_eq!(imported.records[1].trimp(), 420.0);
    }

    #[test]
    fn test_portuguese_headers() {
        let file = csv_file(
            "data,ansiedade,depressao,estresse_dass,humor\n\
             01/04/2024,1,0,2,4\n",
        );
        let imported = CsvImporter::new().import_psychological(file.path()).unwrap();
        assert_eq!(imported.summary.imported, 1);
        assert_eq!(imported.records[0].stress(), 2);
        assert_eq!(imported.records[0].mood(), 4);
    }

    #[test]
    fn test_readiness_import_scores_rows() {
        let file = csv_file(
            "date,sleep_quality,sleep_duration,stress,muscle_soreness,energy,motivation,nutrition,hydration,fatigue\n\
             2024-03-07,5,10,1,1,5,5,5,5,\n\
             2024-03-08,1,4,5,5,1,1,1,1,5\n\
             2024-03-09,6,8,1,1,5,5,5,5,\n",
        );
        let imported = CsvImporter::new().import_readiness(file.path()).unwrap();

        assert_eq!(imported.summary.rejected, 1);
        assert_eq!(imported.records[0].score(), 100);
        assert_eq!(imported.records[0].components().fatigue, None);
        assert_eq!(imported.records[1].score(), 0);
        assert_eq!(imported.records[1].components().fatigue, Some(5));
    }

    #[test]
    fn test_missing_column_and_file() {
        let file = csv_file("date,duration\n2024-03-07,60\n");
        let err = CsvImporter::new().import_training(file.path()).unwrap_err();
        assert!(matches!(
            err,
            AthleteMonitorError::Import(ImportError::MissingColumn { ref column, .. }) if column == "rpe"
        ));

        let err = CsvImporter::new()
            .import_training("/definitely/not/here.csv")
            .unwrap_err();
        assert!(matches!(
            err,
            AthleteMonitorError::Import(ImportError::FileNotFound { .. })
        ));
    }
}
