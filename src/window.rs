//! Analysis windows over imported records
//!
//! CTL and ATL on any day carry every session logged before it, so the load
//! model always runs over the full zero-filled history of the supplied
//! records. A window only trims what is reported afterwards.

use chrono::NaiveDate;
use tracing::debug;

use crate::correlator::CrossModuleCorrelator;
use crate::error::ValidationError;
use crate::models::{PsychologicalRecord, ReadinessRecord, TrainingRecord};
use crate::normalizer::{
    normalize_psychological, normalize_readiness, normalize_training, DailySeries, DateRange,
    PsychologicalDay, ReadinessDay, TrainingDay,
};
use crate::pmc::{DailyLoadRecord, PmcCalculator, PmcConfig};
use crate::statistics::CorrelationMethod;

/// Normalized series of every module, trimmed to the reported window
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    history: DateRange,
    range: DateRange,
    readiness: DailySeries<ReadinessDay>,
    training: Vec<TrainingDay>,
    loads: Vec<DailyLoadRecord>,
    psychological: DailySeries<PsychologicalDay>,
    has_readiness: bool,
    has_training: bool,
    has_psychological: bool,
}

impl AnalysisWindow {
    /// Build the window ending on the latest record of any module.
    ///
    /// `days` keeps only the last N calendar days; `None` keeps the whole
    /// history. Returns `Ok(None)` when no module has a record.
    pub fn build(
        readiness: &[ReadinessRecord],
        training: &[TrainingRecord],
        psychological: &[PsychologicalRecord],
        days: Option<u32>,
        pmc: &PmcConfig,
    ) -> Result<Option<Self>, ValidationError> {
        let dates = readiness
            .iter()
            .map(ReadinessRecord::date)
            .chain(training.iter().map(TrainingRecord::date))
            .chain(psychological.iter().map(PsychologicalRecord::date));
        let Some(history) = DateRange::covering(dates)? else {
            return Ok(None);
        };

        let range = match days {
            Some(days) => DateRange::ending_on(history.end(), days)?
                .intersect(&history)
                .unwrap_or(history),
            None => history,
        };

        let all_days = normalize_training(training, &history);
        let loads = PmcCalculator::with_config(pmc.clone()).calculate_pmc_series(&all_days);
        let training_days = all_days
            .into_iter()
            .filter(|d| range.contains(d.date))
            .collect();
        let loads = loads
            .into_iter()
            .filter(|l| range.contains(l.date))
            .collect();

        debug!(
            history_start = %history.start(),
            start = %range.start(),
            end = %range.end(),
            "analysis window built"
        );

        Ok(Some(AnalysisWindow {
            history,
            range,
            readiness: normalize_readiness(readiness, &range),
            training: training_days,
            loads,
            psychological: normalize_psychological(psychological, &range),
            has_readiness: !readiness.is_empty(),
            has_training: !training.is_empty(),
            has_psychological: !psychological.is_empty(),
        }))
    }

    /// Every day covered by the supplied records
    pub fn history(&self) -> DateRange {
        self.history
    }

    /// Days reported on
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn readiness(&self) -> &DailySeries<ReadinessDay> {
        &self.readiness
    }

    pub fn training(&self) -> &[TrainingDay] {
        &self.training
    }

    /// Load model output for the window, computed over the full history
    pub fn loads(&self) -> &[DailyLoadRecord] {
        &self.loads
    }

    pub fn psychological(&self) -> &DailySeries<PsychologicalDay> {
        &self.psychological
    }

    /// Correlator with every module that had at least one record attached
    pub fn correlator(
        &self,
        method: CorrelationMethod,
        min_samples: usize,
    ) -> CrossModuleCorrelator {
        let mut correlator = CrossModuleCorrelator::new(method).with_min_samples(min_samples);
        if self.has_readiness {
            correlator = correlator.with_readiness(&self.readiness);
        }
        if self.has_training {
            correlator = correlator.with_training(&self.loads);
        }
        if self.has_psychological {
            correlator = correlator.with_psychological(&self.psychological);
        }
        correlator
    }

    /// One named column (e.g. `readiness_score`, `training_tsb`) over the
    /// days its module has a row for, `None` for unknown or absent modules
    pub fn column(&self, name: &str) -> Option<(Vec<NaiveDate>, Vec<f64>)> {
        let single = CrossModuleCorrelator::new(CorrelationMethod::Pearson);
        let single = match name.split('_').next()? {
            "readiness" if self.has_readiness => single.with_readiness(&self.readiness),
            "training" if self.has_training => single.with_training(&self.loads),
            "psych" if self.has_psychological => single.with_psychological(&self.psychological),
            _ => return None,
        };
        let frame = single.align();
        let values = frame.column(name)?.to_vec();
        Some((frame.dates, values))
    }
}

/// Daily load rows between `from` and `to` (both inclusive and optional).
///
/// The model runs from the first session through `to` (or the last
/// session, whichever is later), so selecting a range never changes the
/// values shown for a day. Returns `Ok(None)` when there are no sessions.
pub fn select_load_rows(
    records: &[TrainingRecord],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    pmc: &PmcConfig,
) -> Result<Option<Vec<DailyLoadRecord>>, ValidationError> {
    if let (Some(from), Some(to)) = (from, to) {
        DateRange::new(from, to)?;
    }
    let Some(history) = DateRange::covering(records.iter().map(TrainingRecord::date))? else {
        return Ok(None);
    };

    let end = to.map_or(history.end(), |to| to.max(history.end()));
    let days = normalize_training(records, &DateRange::new(history.start(), end)?);
    let rows = PmcCalculator::with_config(pmc.clone())
        .calculate_pmc_series(&days)
        .into_iter()
        .filter(|r| from.map_or(true, |from| r.date >= from) && to.map_or(true, |to| r.date <= to))
        .collect();
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::insights::InsightEngine;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap() + Duration::days(offset)
    }

    /// 60 hard days followed by 30 easy days
    fn block_then_taper() -> Vec<TrainingRecord> {
        (0..90)
            .map(|i| {
                if i < 60 {
                    TrainingRecord::new(day(i), 120.0, 9.0).unwrap()
                } else {
                    TrainingRecord::new(day(i), 30.0, 3.0).unwrap()
                }
            })
            .collect()
    }

    #[test]
    fn test_window_keeps_full_history_load() {
        let training = block_then_taper();
        let pmc = PmcConfig::default();

        let full = AnalysisWindow::build(&[], &training, &[], None, &pmc)
            .unwrap()
            .unwrap();
        let recent = AnalysisWindow::build(&[], &training, &[], Some(14), &pmc)
            .unwrap()
            .unwrap();

        assert_eq!(full.loads().len(), 90);
        assert_eq!(recent.loads().len(), 14);
        assert_eq!(recent.training().len(), 14);
        assert_eq!(recent.range().start(), day(76));
        assert_eq!(recent.history(), full.history());

        let full_last = full.loads().last().unwrap();
        let recent_last = recent.loads().last().unwrap();
        assert_eq!(recent_last.date, full_last.date);
        assert_eq!(recent_last.load.ctl, full_last.load.ctl);
        assert_eq!(recent_last.load.tsb, full_last.load.tsb);
        assert!(recent_last.load.tsb > 30.0);
    }

    #[test]
    fn test_window_insights_see_taper_freshness() {
        let training = block_then_taper();
        let config = AnalyticsConfig::default();
        let window = AnalysisWindow::build(&[], &training, &[], Some(14), &config.pmc)
            .unwrap()
            .unwrap();

        let insights = InsightEngine::with_config(config).generate_for(&window);
        let tsb = insights
            .iter()
            .find(|i| i.rule == "tsb_state")
            .expect("taper should read as fresh");
        assert!(tsb.statistic.as_ref().unwrap().value > 30.0);
    }

    #[test]
    fn test_window_longer_than_history_is_clamped() {
        let training = vec![
            TrainingRecord::new(day(0), 60.0, 5.0).unwrap(),
            TrainingRecord::new(day(4), 60.0, 5.0).unwrap(),
        ];
        let window = AnalysisWindow::build(&[], &training, &[], Some(365), &PmcConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.range(), window.history());
        assert_eq!(window.loads().len(), 5);
    }

    #[test]
    fn test_window_spans_all_modules() {
        let psych = vec![PsychologicalRecord::new(day(10), 1, 1, 1, 3).unwrap()];
        let training = vec![TrainingRecord::new(day(0), 60.0, 5.0).unwrap()];
        let window = AnalysisWindow::build(&[], &training, &psych, Some(3), &PmcConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(window.range().start(), day(8));
        assert_eq!(window.range().end(), day(10));
        assert_eq!(window.psychological().observation_count(), 1);
        assert!(window.training().iter().all(TrainingDay::is_rest_day));
        // The day-0 session still decays through the window
        assert!(window.loads()[0].load.ctl > 0.0);
    }

    #[test]
    fn test_window_rejects_huge_day_counts() {
        let training = vec![TrainingRecord::new(day(0), 60.0, 5.0).unwrap()];
        let err = AnalysisWindow::build(&[], &training, &[], Some(u32::MAX), &PmcConfig::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::WindowTooLong { .. }));
    }

    #[test]
    fn test_empty_inputs_build_nothing() {
        assert!(AnalysisWindow::build(&[], &[], &[], Some(7), &PmcConfig::default())
            .unwrap()
            .is_none());
        assert!(select_load_rows(&[], None, None, &PmcConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_correlator_attaches_supplied_modules_only() {
        let training: Vec<TrainingRecord> = (0..10)
            .map(|i| TrainingRecord::new(day(i), 30.0 + i as f64 * 5.0, 5.0).unwrap())
            .collect();
        let window = AnalysisWindow::build(&[], &training, &[], None, &PmcConfig::default())
            .unwrap()
            .unwrap();

        // No readiness module, so the join is the ten training days
        let frame = window.correlator(CorrelationMethod::Pearson, 2).align();
        assert_eq!(frame.len(), 10);
        assert!(frame.column("readiness_score").is_none());
        assert!(frame.column("training_tss").is_some());
    }

    #[test]
    fn test_column_lookup() {
        let training = block_then_taper();
        let window = AnalysisWindow::build(&[], &training, &[], Some(14), &PmcConfig::default())
            .unwrap()
            .unwrap();

        let (dates, tsb) = window.column("training_tsb").unwrap();
        assert_eq!(dates.len(), 14);
        assert_eq!(dates[0], day(76));
        assert_eq!(tsb[13], window.loads()[13].load.tsb);

        assert!(window.column("readiness_score").is_none());
        assert!(window.column("training_unknown").is_none());
        assert!(window.column("weather").is_none());
    }

    #[test]
    fn test_load_rows_selection_matches_full_series() {
        let training = block_then_taper();
        let pmc = PmcConfig::default();
        let all = select_load_rows(&training, None, None, &pmc).unwrap().unwrap();
        assert_eq!(all.len(), 90);

        let slice = select_load_rows(&training, Some(day(70)), Some(day(79)), &pmc)
            .unwrap()
            .unwrap();
        assert_eq!(slice.len(), 10);
        assert_eq!(slice[0].date, day(70));
        assert_eq!(slice[0].load.ctl, all[70].load.ctl);
        assert_eq!(slice[9].load.tsb, all[79].load.tsb);
    }

    #[test]
    fn test_load_rows_extend_past_last_session() {
        let training = vec![TrainingRecord::new(day(0), 60.0, 8.0).unwrap()];
        let rows = select_load_rows(&training, Some(day(3)), Some(day(5)), &PmcConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].date, day(5));
        assert!(rows.iter().all(|r| r.session_count == 0));
        assert!(rows[2].load.atl < rows[0].load.atl);
    }

    #[test]
    fn test_load_rows_reject_inverted_range() {
        let training = vec![TrainingRecord::new(day(0), 60.0, 8.0).unwrap()];
        let err = select_load_rows(&training, Some(day(5)), Some(day(1)), &PmcConfig::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDateRange { .. }));
    }
}
