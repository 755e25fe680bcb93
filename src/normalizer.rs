//! Record normalizer
//!
//! Turns sparse, irregular self-reports into dense per-day series over an
//! inclusive date window. Training gaps are zero load (a rest day is real
//! information). Readiness and psychological gaps are `None`: absence of a
//! questionnaire says nothing about the athlete and must never be averaged
//! in as a low score.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{PsychologicalRecord, ReadinessRecord, TrainingRecord};

/// Longest window the normalizer will allocate slots for (about a century)
pub const MAX_WINDOW_DAYS: u32 = 36_525;

/// Inclusive calendar window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        let days = (end - start).num_days() as u64 + 1;
        if days > u64::from(MAX_WINDOW_DAYS) {
            return Err(ValidationError::WindowTooLong {
                days,
                max: MAX_WINDOW_DAYS,
            });
        }
        Ok(Self { start, end })
    }

    /// The `days`-long window ending on `end`
    pub fn ending_on(end: NaiveDate, days: u32) -> Result<Self, ValidationError> {
        if days > MAX_WINDOW_DAYS {
            return Err(ValidationError::WindowTooLong {
                days: u64::from(days),
                max: MAX_WINDOW_DAYS,
            });
        }
        let span = u64::from(days.max(1) - 1);
        let start = end
            .checked_sub_days(Days::new(span))
            .ok_or(ValidationError::WindowTooLong {
                days: u64::from(days),
                max: MAX_WINDOW_DAYS,
            })?;
        Self::new(start, end)
    }

    /// Smallest window covering every date yielded, or `None` when empty.
    /// Fails when the dates span more than [`MAX_WINDOW_DAYS`].
    pub fn covering<I: IntoIterator<Item = NaiveDate>>(
        dates: I,
    ) -> Result<Option<Self>, ValidationError> {
        let mut iter = dates.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let (start, end) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Self::new(start, end).map(Some)
    }

    /// Intersection with `other`, `None` when they do not overlap
    pub fn intersect(&self, other: &DateRange) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days in the window (always at least one)
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Slot index of `date`, if inside the window
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.contains(date)
            .then(|| (date - self.start).num_days() as usize)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.len())
    }
}

/// One calendar day of training, possibly a rest day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDay {
    pub date: NaiveDate,

    /// Number of sessions logged on this day
    pub session_count: u16,

    /// Summed session duration in minutes
    pub duration_minutes: f64,

    /// Summed TRIMP
    pub trimp: f64,

    /// Summed TSS (full precision)
    pub tss: f64,

    /// Mean session RPE, `None` on rest days
    pub mean_rpe: Option<f64>,
}

impl TrainingDay {
    fn rest(date: NaiveDate) -> Self {
        Self {
            date,
            session_count: 0,
            duration_minutes: 0.0,
            trimp: 0.0,
            tss: 0.0,
            mean_rpe: None,
        }
    }

    pub fn is_rest_day(&self) -> bool {
        self.session_count == 0
    }
}

/// Readiness observations of one day, averaged when several were submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessDay {
    pub date: NaiveDate,
    pub entries: u16,
    pub score: f64,
    pub sleep_quality: f64,
    pub sleep_duration_hours: f64,
    pub stress: f64,
    pub muscle_soreness: f64,
    pub energy: f64,
    pub motivation: f64,
    pub nutrition: f64,
    pub hydration: f64,
    pub fatigue: Option<f64>,
}

/// Psychological observations of one day, averaged when several were submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologicalDay {
    pub date: NaiveDate,
    pub entries: u16,
    pub anxiety: f64,
    pub depression: f64,
    pub stress: f64,
    pub mood: f64,
    pub dass_score: f64,
}

/// Dense per-day series where a slot may hold no observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries<T> {
    range: DateRange,
    slots: Vec<Option<T>>,
}

impl<T> DailySeries<T> {
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    pub fn get(&self, date: NaiveDate) -> Option<&T> {
        self.range
            .index_of(date)
            .and_then(|idx| self.slots[idx].as_ref())
    }

    /// `(date, observation)` pairs for every calendar day
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<&T>)> + '_ {
        self.range.days().zip(self.slots.iter().map(Option::as_ref))
    }

    /// Only the days that carry an observation, in date order
    pub fn observed(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().flatten()
    }

    pub fn observation_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Project a numeric field, with `NaN` marking days without an observation
    pub fn values<F>(&self, field: F) -> Vec<f64>
    where
        F: Fn(&T) -> f64,
    {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(&field).unwrap_or(f64::NAN))
            .collect()
    }
}

fn bucket_by_day<'a, R, F>(records: &'a [R], range: &DateRange, date_of: F) -> Vec<Vec<&'a R>>
where
    F: Fn(&R) -> NaiveDate,
{
    let mut buckets: Vec<Vec<&R>> = (0..range.len()).map(|_| Vec::new()).collect();
    let mut outside = 0usize;
    for record in records {
        match range.index_of(date_of(record)) {
            Some(idx) => buckets[idx].push(record),
            None => outside += 1,
        }
    }
    if outside > 0 {
        debug!(outside, "records outside the requested window ignored");
    }
    buckets
}

fn mean_of<R, F>(items: &[&R], field: F) -> f64
where
    F: Fn(&R) -> f64,
{
    items.iter().map(|r| field(*r)).sum::<f64>() / items.len() as f64
}

/// Dense daily training load: sums TSS, TRIMP and duration, averages RPE.
/// Days without sessions are zero-load rest days.
pub fn normalize_training(records: &[TrainingRecord], range: &DateRange) -> Vec<TrainingDay> {
    let buckets = bucket_by_day(records, range, TrainingRecord::date);

    let days: Vec<TrainingDay> = range
        .days()
        .zip(buckets)
        .map(|(date, sessions)| {
            if sessions.is_empty() {
                return TrainingDay::rest(date);
            }
            TrainingDay {
                date,
                session_count: sessions.len() as u16,
                duration_minutes: sessions.iter().map(|s| s.duration_minutes()).sum(),
                trimp: sessions.iter().map(|s| s.trimp()).sum(),
                tss: sessions.iter().map(|s| s.tss()).sum(),
                mean_rpe: Some(mean_of(&sessions, TrainingRecord::rpe)),
            }
        })
        .collect();

    debug!(
        days = days.len(),
        training_days = days.iter().filter(|d| !d.is_rest_day()).count(),
        "training series normalized"
    );
    days
}

/// Dense readiness series with `None` on days without a questionnaire
pub fn normalize_readiness(
    records: &[ReadinessRecord],
    range: &DateRange,
) -> DailySeries<ReadinessDay> {
    let buckets = bucket_by_day(records, range, ReadinessRecord::date);

    let slots = range
        .days()
        .zip(buckets)
        .map(|(date, entries)| {
            if entries.is_empty() {
                return None;
            }
            let fatigue: Vec<f64> = entries
                .iter()
                .filter_map(|r| r.components().fatigue.map(f64::from))
                .collect();
            Some(ReadinessDay {
                date,
                entries: entries.len() as u16,
                score: mean_of(&entries, |r| f64::from(r.score())),
                sleep_quality: mean_of(&entries, |r| f64::from(r.components().sleep_quality)),
                sleep_duration_hours: mean_of(&entries, |r| r.components().sleep_duration_hours),
                stress: mean_of(&entries, |r| f64::from(r.components().stress)),
                muscle_soreness: mean_of(&entries, |r| f64::from(r.components().muscle_soreness)),
                energy: mean_of(&entries, |r| f64::from(r.components().energy)),
                motivation: mean_of(&entries, |r| f64::from(r.components().motivation)),
                nutrition: mean_of(&entries, |r| f64::from(r.components().nutrition)),
                hydration: mean_of(&entries, |r| f64::from(r.components().hydration)),
                fatigue: (!fatigue.is_empty())
                    .then(|| fatigue.iter().sum::<f64>() / fatigue.len() as f64),
            })
        })
        .collect();

    let series = DailySeries {
        range: *range,
        slots,
    };
    debug!(
        days = series.len(),
        observed = series.observation_count(),
        "readiness series normalized"
    );
    series
}

/// Dense psychological series with `None` on days without a check-in
pub fn normalize_psychological(
    records: &[PsychologicalRecord],
    range: &DateRange,
) -> DailySeries<PsychologicalDay> {
    let buckets = bucket_by_day(records, range, PsychologicalRecord::date);

    let slots = range
        .days()
        .zip(buckets)
        .map(|(date, entries)| {
            (!entries.is_empty()).then(|| PsychologicalDay {
                date,
                entries: entries.len() as u16,
                anxiety: mean_of(&entries, |r| f64::from(r.anxiety())),
                depression: mean_of(&entries, |r| f64::from(r.depression())),
                stress: mean_of(&entries, |r| f64::from(r.stress())),
                mood: mean_of(&entries, |r| f64::from(r.mood())),
                dass_score: mean_of(&entries, |r| f64::from(r.dass_score())),
            })
        })
        .collect();

    let series = DailySeries {
        range: *range,
        slots,
    };
    debug!(
        days = series.len(),
        observed = series.observation_count(),
        "psychological series normalized"
    );
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(d(start), d(end)).unwrap()
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::new(d(10), d(9)).is_err());
        let single = range(5, 5);
        assert_eq!(single.len(), 1);
        assert_eq!(single.days().collect::<Vec<_>>(), vec![d(5)]);

        let week = DateRange::ending_on(d(7), 7).unwrap();
        assert_eq!(week.start(), d(1));
        assert_eq!(week.index_of(d(3)), Some(2));
        assert_eq!(week.index_of(d(8)), None);
    }

    #[test]
    fn test_date_range_covering() {
        assert!(DateRange::covering(Vec::new()).unwrap().is_none());
        let covering = DateRange::covering(vec![d(9), d(2), d(5)]).unwrap().unwrap();
        assert_eq!(covering.start(), d(2));
        assert_eq!(covering.end(), d(9));

        let far = NaiveDate::from_ymd_opt(1800, 1, 1).unwrap();
        assert!(matches!(
            DateRange::covering(vec![far, d(1)]),
            Err(ValidationError::WindowTooLong { .. })
        ));
    }

    #[test]
    fn test_huge_windows_rejected() {
        assert!(matches!(
            DateRange::ending_on(d(30), u32::MAX),
            Err(ValidationError::WindowTooLong { max: MAX_WINDOW_DAYS, .. })
        ));
        assert!(DateRange::ending_on(d(30), MAX_WINDOW_DAYS).is_ok());
        assert_eq!(
            DateRange::ending_on(d(30), MAX_WINDOW_DAYS).unwrap().len(),
            MAX_WINDOW_DAYS as usize
        );
        // Near the calendar floor the subtraction itself overflows
        assert!(DateRange::ending_on(NaiveDate::MIN, 2).is_err());
        assert!(DateRange::ending_on(d(3), 0).unwrap().len() == 1);
    }

    #[test]
    fn test_date_range_intersect() {
        let a = range(1, 10);
        assert_eq!(a.intersect(&range(5, 20)), Some(range(5, 10)));
        assert_eq!(a.intersect(&range(11, 20)), None);
    }

    #[test]
    fn test_training_gaps_are_zero_load() {
        let records = vec![
            TrainingRecord::new(d(1), 60.0, 10.0).unwrap(),
            TrainingRecord::new(d(4), 30.0, 5.0).unwrap(),
        ];
        let days = normalize_training(&records, &range(1, 5));

        assert_eq!(days.len(), 5);
        assert!((days[0].tss - 100.0).abs() < 1e-9);
        assert!(days[1].is_rest_day());
        assert_eq!(days[1].tss, 0.0);
        assert_eq!(days[1].trimp, 0.0);
        assert_eq!(days[1].mean_rpe, None);
        assert_eq!(days[3].trimp, 150.0);
        assert_eq!(days[4].date, d(5));
    }

    #[test]
    fn test_multiple_sessions_aggregate() {
        let records = vec![
            TrainingRecord::new(d(2), 60.0, 4.0).unwrap(),
            TrainingRecord::new(d(2), 30.0, 8.0).unwrap(),
        ];
        let days = normalize_training(&records, &range(2, 2));
        let day = &days[0];

        assert_eq!(day.session_count, 2);
        assert_eq!(day.duration_minutes, 90.0);
        assert_eq!(day.trimp, 480.0);
        assert!((day.tss - (16.0 + 32.0)).abs() < 1e-9);
        assert_eq!(day.mean_rpe, Some(6.0));
    }

    #[test]
    fn test_records_outside_window_ignored() {
        let records = vec![
            TrainingRecord::new(d(1), 60.0, 5.0).unwrap(),
            TrainingRecord::new(d(20), 60.0, 5.0).unwrap(),
        ];
        let days = normalize_training(&records, &range(2, 3));
        assert!(days.iter().all(TrainingDay::is_rest_day));
    }

    #[test]
    fn test_psychological_gaps_are_missing() {
        let records = vec![
            PsychologicalRecord::new(d(1), 0, 0, 0, 5).unwrap(),
            PsychologicalRecord::new(d(3), 3, 3, 3, 1).unwrap(),
            PsychologicalRecord::new(d(3), 3, 3, 3, 3).unwrap(),
        ];
        let series = normalize_psychological(&records, &range(1, 4));

        assert_eq!(series.len(), 4);
        assert_eq!(series.observation_count(), 2);
        assert!(series.get(d(2)).is_none());
        assert_eq!(series.get(d(3)).unwrap().mood, 2.0);
        assert_eq!(series.get(d(3)).unwrap().entries, 2);

        let scores = series.values(|p| p.dass_score);
        assert_eq!(scores[0], 100.0);
        assert!(scores[1].is_nan());
        assert_eq!(scores[2], 0.0);
        assert!(scores[3].is_nan());
    }

    #[test]
    fn test_readiness_days_average_components() {
        use crate::models::ReadinessComponents;

        let make = |day, energy, fatigue| {
            ReadinessRecord::new(
                d(day),
                ReadinessComponents {
                    sleep_quality: 4,
                    sleep_duration_hours: 8.0,
                    stress: 2,
                    muscle_soreness: 2,
                    energy,
                    motivation: 4,
                    nutrition: 4,
                    hydration: 4,
                    fatigue,
                },
            )
            .unwrap()
        };
        let records = vec![make(1, 3, None), make(1, 5, Some(2)), make(3, 4, None)];
        let series = normalize_readiness(&records, &range(1, 3));

        let first = series.get(d(1)).unwrap();
        assert_eq!(first.energy, 4.0);
        assert_eq!(first.fatigue, Some(2.0));
        assert!(series.get(d(2)).is_none());
        assert_eq!(series.get(d(3)).unwrap().fatigue, None);
        assert_eq!(series.observed().count(), 2);
    }
}
