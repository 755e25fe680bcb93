//! Heuristic insight engine
//!
//! Facts are computed once from the three daily series; an ordered rule
//! table then reads them. Each rule fires at most one insight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::normalizer::{DailySeries, PsychologicalDay, ReadinessDay, TrainingDay};
use crate::pmc::{DailyLoadRecord, PmcCalculator};
use crate::scores::ReadinessComponent;
use crate::statistics::{self, CorrelationMethod};
use crate::window::AnalysisWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Trend,
    Component,
    WeekdayPattern,
    Load,
    Correlation,
    InsufficientData,
    General,
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsightCategory::Trend => "trend",
            InsightCategory::Component => "component",
            InsightCategory::WeekdayPattern => "weekday pattern",
            InsightCategory::Load => "load",
            InsightCategory::Correlation => "correlation",
            InsightCategory::InsufficientData => "insufficient data",
            InsightCategory::General => "general",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Positive,
    Info,
    Warning,
}

/// Number backing an insight (slope, coefficient, mean, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingStatistic {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: InsightCategory,
    /// Id of the rule that produced it
    pub rule: String,
    pub message: String,
    pub statistic: Option<SupportingStatistic>,
    pub severity: InsightSeverity,
}

/// Rule output before the engine tags it with the rule's id and category
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub message: String,
    pub severity: InsightSeverity,
    pub statistic: Option<SupportingStatistic>,
}

impl Finding {
    fn new(message: String, severity: InsightSeverity) -> Self {
        Finding {
            message,
            severity,
            statistic: None,
        }
    }

    fn with_statistic(mut self, name: &str, value: f64) -> Self {
        self.statistic = Some(SupportingStatistic {
            name: name.to_string(),
            value,
        });
        self
    }
}

/// Everything the rules read, computed once per request
#[derive(Debug, Clone)]
pub struct Facts {
    /// Days with a readiness questionnaire, in date order
    pub readiness: Vec<ReadinessDay>,

    /// Dense training days including rest days
    pub training: Vec<TrainingDay>,

    /// Load model output aligned with `training`
    pub loads: Vec<DailyLoadRecord>,

    /// Days with a psychological check-in, in date order
    pub psychological: Vec<PsychologicalDay>,
}

impl Facts {
    pub fn gather(
        readiness: &DailySeries<ReadinessDay>,
        training: &[TrainingDay],
        psychological: &DailySeries<PsychologicalDay>,
        config: &AnalyticsConfig,
    ) -> Self {
        let loads = PmcCalculator::with_config(config.pmc.clone()).calculate_pmc_series(training);
        Self::with_loads(readiness, training, loads, psychological)
    }

    /// Facts over loads that were already computed, typically over a longer
    /// history than the `training` days shown
    pub fn with_loads(
        readiness: &DailySeries<ReadinessDay>,
        training: &[TrainingDay],
        loads: Vec<DailyLoadRecord>,
        psychological: &DailySeries<PsychologicalDay>,
    ) -> Self {
        Facts {
            readiness: readiness.observed().cloned().collect(),
            training: training.to_vec(),
            loads,
            psychological: psychological.observed().cloned().collect(),
        }
    }

    pub fn from_window(window: &AnalysisWindow) -> Self {
        Self::with_loads(
            window.readiness(),
            window.training(),
            window.loads().to_vec(),
            window.psychological(),
        )
    }

    pub fn readiness_count(&self) -> usize {
        self.readiness.len()
    }

    /// Days with at least one session
    pub fn training_count(&self) -> usize {
        self.training.iter().filter(|d| !d.is_rest_day()).count()
    }

    pub fn psychological_count(&self) -> usize {
        self.psychological.len()
    }

    fn readiness_column(&self, field: fn(&ReadinessDay) -> f64) -> Vec<(NaiveDate, f64)> {
        self.readiness.iter().map(|d| (d.date, field(d))).collect()
    }

    fn training_column(&self, field: fn(&TrainingDay) -> f64) -> Vec<(NaiveDate, f64)> {
        self.training.iter().map(|d| (d.date, field(d))).collect()
    }

    fn psychological_column(&self, field: fn(&PsychologicalDay) -> f64) -> Vec<(NaiveDate, f64)> {
        self.psychological.iter().map(|d| (d.date, field(d))).collect()
    }
}

/// Values of both columns on the dates they share
fn aligned(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> (Vec<f64>, Vec<f64>) {
    let lookup: BTreeMap<NaiveDate, f64> = b.iter().copied().collect();
    a.iter()
        .filter_map(|(date, x)| lookup.get(date).map(|y| (*x, *y)))
        .unzip()
}

pub type RuleFn = fn(&Facts, &AnalyticsConfig) -> Option<Finding>;

/// One entry of the rule table
pub struct InsightRule {
    pub id: &'static str,
    pub category: InsightCategory,
    pub evaluate: RuleFn,
}

/// Rules in evaluation order
pub static RULES: &[InsightRule] = &[
    InsightRule {
        id: "readiness_trend",
        category: InsightCategory::Trend,
        evaluate: readiness_trend,
    },
    InsightRule {
        id: "weakest_readiness_component",
        category: InsightCategory::Component,
        evaluate: weakest_readiness_component,
    },
    InsightRule {
        id: "elevated_dass_component",
        category: InsightCategory::Component,
        evaluate: elevated_dass_component,
    },
    InsightRule {
        id: "readiness_weekday_pattern",
        category: InsightCategory::WeekdayPattern,
        evaluate: readiness_weekday_pattern,
    },
    InsightRule {
        id: "mood_weekday_pattern",
        category: InsightCategory::WeekdayPattern,
        evaluate: mood_weekday_pattern,
    },
    InsightRule {
        id: "tsb_state",
        category: InsightCategory::Load,
        evaluate: tsb_state,
    },
    InsightRule {
        id: "training_monotony",
        category: InsightCategory::Load,
        evaluate: training_monotony,
    },
    InsightRule {
        id: "dass_trend",
        category: InsightCategory::Trend,
        evaluate: dass_trend,
    },
    InsightRule {
        id: "mood_sleep_correlation",
        category: InsightCategory::Correlation,
        evaluate: mood_sleep_correlation,
    },
    InsightRule {
        id: "anxiety_depression_correlation",
        category: InsightCategory::Correlation,
        evaluate: anxiety_depression_correlation,
    },
    InsightRule {
        id: "stress_trimp_correlation",
        category: InsightCategory::Correlation,
        evaluate: stress_trimp_correlation,
    },
    InsightRule {
        id: "readiness_trimp_correlation",
        category: InsightCategory::Correlation,
        evaluate: readiness_trimp_correlation,
    },
    InsightRule {
        id: "dass_readiness_correlation",
        category: InsightCategory::Correlation,
        evaluate: dass_readiness_correlation,
    },
];

fn readiness_trend(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let thresholds = &config.insights;
    let n = facts.readiness_count();
    // Two full weeks are compared regardless of the configured minimum
    let needed = thresholds
        .trend_min_observations
        .max(thresholds.min_observations)
        .max(14);
    if n < needed {
        return None;
    }

    let scores: Vec<f64> = facts.readiness.iter().map(|d| d.score).collect();
    let recent = statistics::mean(&scores[n - 7..])?;
    let prior = statistics::mean(&scores[n - 14..n - 7])?;
    let change = recent - prior;

    if change > thresholds.trend_delta {
        Some(
            Finding::new(
                format!(
                    "Readiness is improving: the last 7 entries average {:.0}, up {:.1} points on the 7 before",
                    recent, change
                ),
                InsightSeverity::Positive,
            )
            .with_statistic("score_change", change),
        )
    } else if change < -thresholds.trend_delta {
        Some(
            Finding::new(
                format!(
                    "Readiness is worsening: the last 7 entries average {:.0}, down {:.1} points on the 7 before",
                    recent,
                    change.abs()
                ),
                InsightSeverity::Warning,
            )
            .with_statistic("score_change", change),
        )
    } else {
        None
    }
}

fn weakest_readiness_component(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let window = config.insights.weakest_window;
    if facts.readiness_count() < config.insights.min_observations
        || facts.readiness_count() < window
    {
        return None;
    }

    let recent = &facts.readiness[facts.readiness.len() - window..];
    let sleep_scale = &config.readiness.sleep_scale;
    let invert = |raw: f64| 6.0 - raw;
    let component_value = |day: &ReadinessDay, component: ReadinessComponent| -> Option<f64> {
        match component {
            ReadinessComponent::SleepQuality => Some(day.sleep_quality),
            ReadinessComponent::SleepDuration => Some(sleep_scale.normalize(day.sleep_duration_hours)),
            ReadinessComponent::Stress => Some(invert(day.stress)),
            ReadinessComponent::MuscleSoreness => Some(invert(day.muscle_soreness)),
            ReadinessComponent::Energy => Some(day.energy),
            ReadinessComponent::Motivation => Some(day.motivation),
            ReadinessComponent::Nutrition => Some(day.nutrition),
            ReadinessComponent::Hydration => Some(day.hydration),
            ReadinessComponent::Fatigue => day.fatigue.map(invert),
        }
    };

    let (component, value) = ReadinessComponent::ALL
        .iter()
        .filter_map(|&component| {
            let values: Vec<f64> = recent
                .iter()
                .filter_map(|day| component_value(day, component))
                .collect();
            statistics::mean(&values).map(|m| (component, m))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let severity = if value < 3.0 {
        InsightSeverity::Warning
    } else {
        InsightSeverity::Info
    };
    Some(
        Finding::new(
            format!(
                "Your weakest readiness area over the last {} entries is {} ({:.1}/5)",
                window, component, value
            ),
            severity,
        )
        .with_statistic(component.label(), value),
    )
}

fn elevated_dass_component(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let window = config.insights.weakest_window;
    let n = facts.psychological_count();
    if n < config.insights.min_observations || n < window {
        return None;
    }

    let recent = &facts.psychological[n - window..];
    let mean_of = |f: fn(&PsychologicalDay) -> f64| {
        recent.iter().map(f).sum::<f64>() / recent.len() as f64
    };
    let (name, value) = [
        ("anxiety", mean_of(|d| d.anxiety)),
        ("depression", mean_of(|d| d.depression)),
        ("stress", mean_of(|d| d.stress)),
    ]
    .into_iter()
    .max_by(|a, b| a.1.total_cmp(&b.1))?;

    (value > config.insights.dass_component_threshold).then(|| {
        Finding::new(
            format!(
                "Your {} rating has been elevated over the last {} check-ins ({:.1}/3). Consider talking to a professional if it persists",
                name, window, value
            ),
            InsightSeverity::Warning,
        )
        .with_statistic(name, value)
    })
}

fn weekday_pattern(
    column: &[(NaiveDate, f64)],
    subject: &str,
    config: &AnalyticsConfig,
) -> Option<Finding> {
    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = column.iter().copied().unzip();
    let ranked = statistics::best_worst_days(&dates, &values, &config.locale, true)?;
    if ranked.ranking.len() < 2 {
        return None;
    }

    let best = ranked.ranking.first()?;
    let worst = ranked.ranking.last()?;
    if best.mean <= worst.mean {
        return None;
    }

    Some(
        Finding::new(
            format!(
                "Your {} tends to be highest on {} ({:.1}) and lowest on {} ({:.1})",
                subject, best.label, best.mean, worst.label, worst.mean
            ),
            InsightSeverity::Info,
        )
        .with_statistic("weekday_spread", best.mean - worst.mean),
    )
}

fn readiness_weekday_pattern(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.readiness_count() < config.insights.min_observations {
        return None;
    }
    weekday_pattern(&facts.readiness_column(|d| d.score), "readiness", config)
}

fn mood_weekday_pattern(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.psychological_count() < config.insights.min_observations {
        return None;
    }
    weekday_pattern(&facts.psychological_column(|d| d.mood), "mood", config)
}

fn tsb_state(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.training_count() < config.insights.min_observations {
        return None;
    }
    let latest = facts.loads.last()?;
    let tsb = latest.load.tsb;

    if tsb < config.insights.tsb_fatigue {
        Some(
            Finding::new(
                format!(
                    "Training stress balance is {:.1}: accumulated fatigue is high, consider cutting volume by {:.0}%",
                    tsb, latest.load.volume_reduction_pct
                ),
                InsightSeverity::Warning,
            )
            .with_statistic("tsb", tsb),
        )
    } else if tsb > config.insights.tsb_fresh {
        Some(
            Finding::new(
                format!(
                    "Training stress balance is {:.1}: you are fresh and ready for a hard session",
                    tsb
                ),
                InsightSeverity::Positive,
            )
            .with_statistic("tsb", tsb),
        )
    } else {
        None
    }
}

fn training_monotony(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.training_count() < config.insights.min_observations {
        return None;
    }
    let latest = facts.loads.last()?;
    let monotony = latest.load.monotony?;

    (monotony > config.insights.monotony_threshold).then(|| {
        Finding::new(
            format!(
                "Training monotony is {:.2} (strain {:.0}): vary daily load with easier and harder days",
                monotony,
                latest.load.strain.unwrap_or(0.0)
            ),
            InsightSeverity::Warning,
        )
        .with_statistic("monotony", monotony)
    })
}

fn dass_trend(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.psychological_count() < config.insights.min_observations {
        return None;
    }
    let scores: Vec<f64> = facts.psychological.iter().map(|d| d.dass_score).collect();
    let trend = statistics::index_trend(&scores)?;

    if trend.slope > config.insights.dass_slope_threshold {
        Some(
            Finding::new(
                format!(
                    "Psychological wellbeing is improving by {:.1} DASS points per assessment",
                    trend.slope
                ),
                InsightSeverity::Positive,
            )
            .with_statistic("slope", trend.slope),
        )
    } else if trend.slope < -config.insights.dass_slope_threshold {
        Some(
            Finding::new(
                format!(
                    "Psychological wellbeing is declining by {:.1} DASS points per assessment",
                    trend.slope.abs()
                ),
                InsightSeverity::Warning,
            )
            .with_statistic("slope", trend.slope),
        )
    } else {
        None
    }
}

fn correlation_flag(
    a: &[(NaiveDate, f64)],
    b: &[(NaiveDate, f64)],
    names: (&str, &str),
    config: &AnalyticsConfig,
) -> Option<Finding> {
    let (x, y) = aligned(a, b);
    let correlation = statistics::correlate_with_floor(
        &x,
        &y,
        CorrelationMethod::Pearson,
        config.statistics.min_correlation_samples,
    )?;
    if !correlation.is_strong(config.insights.correlation_threshold) {
        return None;
    }

    let r = correlation.coefficient;
    let relation = if r > 0.0 {
        "tend to rise and fall together"
    } else {
        "tend to move in opposite directions"
    };
    Some(
        Finding::new(
            format!("{} and {} {} (r = {:.2})", names.0, names.1, relation, r),
            InsightSeverity::Info,
        )
        .with_statistic("r", r),
    )
}

fn mood_sleep_correlation(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let floor = config.insights.min_observations;
    if facts.psychological_count() < floor || facts.readiness_count() < floor {
        return None;
    }
    correlation_flag(
        &facts.psychological_column(|d| d.mood),
        &facts.readiness_column(|d| d.sleep_quality),
        ("Mood", "sleep quality"),
        config,
    )
}

fn anxiety_depression_correlation(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    if facts.psychological_count() < config.insights.min_observations {
        return None;
    }
    correlation_flag(
        &facts.psychological_column(|d| d.anxiety),
        &facts.psychological_column(|d| d.depression),
        ("Anxiety", "depression"),
        config,
    )
}

fn stress_trimp_correlation(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let floor = config.insights.min_observations;
    if facts.psychological_count() < floor || facts.training_count() < floor {
        return None;
    }
    correlation_flag(
        &facts.psychological_column(|d| d.stress),
        &facts.training_column(|d| d.trimp),
        ("Psychological stress", "training load (TRIMP)"),
        config,
    )
}

fn readiness_trimp_correlation(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let floor = config.insights.min_observations;
    if facts.readiness_count() < floor || facts.training_count() < floor {
        return None;
    }
    correlation_flag(
        &facts.readiness_column(|d| d.score),
        &facts.training_column(|d| d.trimp),
        ("Readiness", "training load (TRIMP)"),
        config,
    )
}

fn dass_readiness_correlation(facts: &Facts, config: &AnalyticsConfig) -> Option<Finding> {
    let floor = config.insights.min_observations;
    if facts.psychological_count() < floor || facts.readiness_count() < floor {
        return None;
    }
    correlation_flag(
        &facts.psychological_column(|d| d.dass_score),
        &facts.readiness_column(|d| d.score),
        ("DASS score", "readiness"),
        config,
    )
}

/// Runs the rule table over the facts of one request
pub struct InsightEngine {
    config: AnalyticsConfig,
}

impl InsightEngine {
    pub fn new() -> Self {
        InsightEngine {
            config: AnalyticsConfig::default(),
        }
    }

    pub fn with_config(config: AnalyticsConfig) -> Self {
        InsightEngine { config }
    }

    /// Insights in rule order. Never empty: falls back to a single
    /// insufficient-data or keep-logging insight.
    pub fn generate(
        &self,
        readiness: &DailySeries<ReadinessDay>,
        training: &[TrainingDay],
        psychological: &DailySeries<PsychologicalDay>,
    ) -> Vec<Insight> {
        let facts = Facts::gather(readiness, training, psychological, &self.config);
        self.evaluate(&facts)
    }

    /// Insights for a window whose loads carry the full history
    pub fn generate_for(&self, window: &AnalysisWindow) -> Vec<Insight> {
        self.evaluate(&Facts::from_window(window))
    }

    pub fn evaluate(&self, facts: &Facts) -> Vec<Insight> {
        let floor = self.config.insights.min_observations;
        if facts.readiness_count() < floor
            && facts.training_count() < floor
            && facts.psychological_count() < floor
        {
            debug!(
                readiness = facts.readiness_count(),
                training = facts.training_count(),
                psychological = facts.psychological_count(),
                "not enough observations for insights"
            );
            return vec![Insight {
                category: InsightCategory::InsufficientData,
                rule: "insufficient_data".to_string(),
                message: format!(
                    "Not enough data yet: log at least {} entries to unlock insights",
                    floor
                ),
                statistic: None,
                severity: InsightSeverity::Info,
            }];
        }

        let insights: Vec<Insight> = RULES
            .iter()
            .filter_map(|rule| {
                let finding = (rule.evaluate)(facts, &self.config)?;
                debug!(rule = rule.id, "insight rule fired");
                Some(Insight {
                    category: rule.category,
                    rule: rule.id.to_string(),
                    message: finding.message,
                    statistic: finding.statistic,
                    severity: finding.severity,
                })
            })
            .collect();

        if insights.is_empty() {
            return vec![Insight {
                category: InsightCategory::General,
                rule: "keep_logging".to_string(),
                message: "No notable patterns right now. Keep logging to build a clearer picture"
                    .to_string(),
                statistic: None,
                severity: InsightSeverity::Info,
            }];
        }
        insights
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Insights under the default configuration
pub fn generate_insights(
    readiness: &DailySeries<ReadinessDay>,
    training: &[TrainingDay],
    psychological: &DailySeries<PsychologicalDay>,
) -> Vec<Insight> {
    InsightEngine::new().generate(readiness, training, psychological)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PsychologicalRecord, ReadinessComponents, ReadinessRecord, TrainingRecord};
    use crate::normalizer::{
        normalize_psychological, normalize_readiness, normalize_training, DateRange,
    };
    use chrono::Duration;
    use std::collections::HashSet;

    fn start() -> NaiveDate {
        // A Monday
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn day(offset: i64) -> NaiveDate {
        start() + Duration::days(offset)
    }

    fn window(days: i64) -> DateRange {
        DateRange::new(start(), day(days - 1)).unwrap()
    }

    fn components(level: u8) -> ReadinessComponents {
        ReadinessComponents {
            sleep_quality: level,
            sleep_duration_hours: 8.0,
            stress: 6 - level,
            muscle_soreness: 6 - level,
            energy: level,
            motivation: level,
            nutrition: level,
            hydration: level,
            fatigue: None,
        }
    }

    fn run(
        readiness: &[ReadinessRecord],
        training: &[TrainingRecord],
        psych: &[PsychologicalRecord],
        days: i64,
    ) -> Vec<Insight> {
        let range = window(days);
        generate_insights(
            &normalize_readiness(readiness, &range),
            &normalize_training(training, &range),
            &normalize_psychological(psych, &range),
        )
    }

    fn rules_fired(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.rule.as_str()).collect()
    }

    #[test]
    fn test_rule_ids_unique() {
        let ids: HashSet<&str> = RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), RULES.len());
        assert_eq!(RULES[0].id, "readiness_trend");
    }

    #[test]
    fn test_few_psychological_records_give_single_insufficient_insight() {
        let psych: Vec<PsychologicalRecord> = (0..5)
            .map(|i| PsychologicalRecord::new(day(i), 1, 1, 1, 3).unwrap())
            .collect();
        let insights = run(&[], &[], &psych, 10);

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].category, InsightCategory::InsufficientData);
    }

    #[test]
    fn test_no_data_gives_single_insufficient_insight() {
        let insights = run(&[], &[], &[], 30);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].category, InsightCategory::InsufficientData);
    }

    #[test]
    fn test_keep_logging_when_nothing_fires() {
        let training: Vec<TrainingRecord> = (0..7)
            .map(|i| TrainingRecord::new(day(i), 60.0, 5.0).unwrap())
            .collect();
        let insights = run(&[], &training, &[], 7);

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].rule, "keep_logging");
        assert_eq!(insights[0].category, InsightCategory::General);
    }

    #[test]
    fn test_improving_readiness_trend() {
        let readiness: Vec<ReadinessRecord> = (0..14)
            .map(|i| {
                let level = if i < 7 { 2 } else { 4 };
                ReadinessRecord::new(day(i), components(level)).unwrap()
            })
            .collect();
        let insights = run(&readiness, &[], &[], 14);

        let trend = insights.iter().find(|i| i.rule == "readiness_trend").unwrap();
        assert_eq!(trend.severity, InsightSeverity::Positive);
        assert!(trend.message.contains("improving"));
        assert!(trend.statistic.as_ref().unwrap().value > 5.0);
    }

    #[test]
    fn test_trend_needs_fourteen_observations() {
        let readiness: Vec<ReadinessRecord> = (0..13)
            .map(|i| ReadinessRecord::new(day(i), components(if i < 6 { 2 } else { 5 })).unwrap())
            .collect();
        let insights = run(&readiness, &[], &[], 13);
        assert!(!rules_fired(&insights).contains(&"readiness_trend"));
    }

    #[test]
    fn test_weakest_component_after_inversion() {
        let readiness: Vec<ReadinessRecord> = (0..7)
            .map(|i| {
                let mut c = components(4);
                c.muscle_soreness = 5;
                ReadinessRecord::new(day(i), c).unwrap()
            })
            .collect();
        let insights = run(&readiness, &[], &[], 7);

        let weakest = insights
            .iter()
            .find(|i| i.rule == "weakest_readiness_component")
            .unwrap();
        assert!(weakest.message.contains("muscle soreness"));
        assert_eq!(weakest.statistic.as_ref().unwrap().value, 1.0);
        assert_eq!(weakest.severity, InsightSeverity::Warning);
    }

    #[test]
    fn test_elevated_dass_component_and_trend() {
        let psych: Vec<PsychologicalRecord> = (0..7)
            .map(|i| {
                let anxiety = if i >= 4 { 3 } else { 0 };
                PsychologicalRecord::new(day(i), anxiety, 0, 0, 4).unwrap()
            })
            .collect();
        let insights = run(&[], &[], &psych, 7);
        let fired = rules_fired(&insights);

        assert!(fired.contains(&"elevated_dass_component"));
        let elevated = insights
            .iter()
            .find(|i| i.rule == "elevated_dass_component")
            .unwrap();
        assert!(elevated.message.contains("anxiety"));

        let trend = insights.iter().find(|i| i.rule == "dass_trend").unwrap();
        assert_eq!(trend.severity, InsightSeverity::Warning);
        assert!(trend.statistic.as_ref().unwrap().value < -1.0);
    }

    #[test]
    fn test_weekday_pattern_names_days() {
        // Mondays score high, every other day low
        let readiness: Vec<ReadinessRecord> = (0..14)
            .map(|i| {
                let level = if i % 7 == 0 { 5 } else { 3 };
                ReadinessRecord::new(day(i), components(level)).unwrap()
            })
            .collect();
        let insights = run(&readiness, &[], &[], 14);

        let pattern = insights
            .iter()
            .find(|i| i.rule == "readiness_weekday_pattern")
            .unwrap();
        assert!(pattern.message.contains("highest on Monday"));
    }

    #[test]
    fn test_fatigue_and_monotony_from_training_block() {
        let mut training = Vec::new();
        for i in 10..17 {
            let rpe = if i % 2 == 0 { 10.0 } else { 9.5 };
            training.push(TrainingRecord::new(day(i), 60.0, rpe).unwrap());
        }
        let insights = run(&[], &training, &[], 17);
        let fired = rules_fired(&insights);

        assert!(fired.contains(&"tsb_state"));
        assert!(fired.contains(&"training_monotony"));
        let tsb = insights.iter().find(|i| i.rule == "tsb_state").unwrap();
        assert_eq!(tsb.severity, InsightSeverity::Warning);
        assert!(tsb.statistic.as_ref().unwrap().value < -20.0);
    }

    #[test]
    fn test_anxiety_depression_correlation_flag() {
        let levels = [0u8, 1, 2, 3, 2, 1, 0];
        let psych: Vec<PsychologicalRecord> = levels
            .iter()
            .enumerate()
            .map(|(i, &l)| PsychologicalRecord::new(day(i as i64), l, l, 1, 3).unwrap())
            .collect();
        let insights = run(&[], &[], &psych, 7);

        let flag = insights
            .iter()
            .find(|i| i.rule == "anxiety_depression_correlation")
            .unwrap();
        assert!(flag.message.contains("r = 1.00"));
        assert_eq!(flag.category, InsightCategory::Correlation);
    }

    #[test]
    fn test_sources_below_floor_do_not_fire() {
        let readiness: Vec<ReadinessRecord> = (0..7)
            .map(|i| ReadinessRecord::new(day(i), components(3)).unwrap())
            .collect();
        let psych: Vec<PsychologicalRecord> = (0..3)
            .map(|i| PsychologicalRecord::new(day(i), 3, 3, 3, 1).unwrap())
            .collect();
        let insights = run(&readiness, &[], &psych, 7);
        let fired = rules_fired(&insights);

        assert!(!fired.contains(&"elevated_dass_component"));
        assert!(!fired.contains(&"dass_readiness_correlation"));
        assert!(fired.contains(&"weakest_readiness_component"));
    }
}
