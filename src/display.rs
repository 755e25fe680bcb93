//! Terminal rendering for the CLI

use colored::*;
use tabled::{settings::Style, Table, Tabled};

use crate::correlator::CorrelationReport;
use crate::insights::{Insight, InsightSeverity};
use crate::pmc::{DailyLoadRecord, TsbInterpretation};
use crate::statistics::{SeriesProfile, SignificanceLevel};
use chrono::NaiveDate;

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Sessions")]
    sessions: u16,
    #[tabled(rename = "TRIMP")]
    trimp: String,
    #[tabled(rename = "TSS")]
    tss: String,
    #[tabled(rename = "CTL")]
    ctl: String,
    #[tabled(rename = "ATL")]
    atl: String,
    #[tabled(rename = "TSB")]
    tsb: String,
    #[tabled(rename = "Monotony")]
    monotony: String,
    #[tabled(rename = "Readiness")]
    readiness: u8,
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

/// Daily load table, most recent `limit` days
pub fn load_table(records: &[DailyLoadRecord], limit: usize) -> String {
    let start = records.len().saturating_sub(limit);
    let rows: Vec<LoadRow> = records[start..]
        .iter()
        .map(|r| LoadRow {
            date: r.date.to_string(),
            sessions: r.session_count,
            trimp: format!("{:.0}", r.trimp),
            tss: format!("{:.1}", r.load.tss),
            ctl: format!("{:.1}", r.load.ctl),
            atl: format!("{:.1}", r.load.atl),
            tsb: format!("{:+.1}", r.load.tsb),
            monotony: optional(r.load.monotony, 2),
            readiness: r.load.readiness_from_tsb,
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// One-line summary of the latest day's form
pub fn load_summary(latest: &DailyLoadRecord) -> String {
    let interpretation = TsbInterpretation::from_tsb(latest.load.tsb);
    let tsb = format!("{:+.1}", latest.load.tsb);
    let tsb = if latest.load.tsb < -10.0 {
        tsb.red()
    } else if latest.load.tsb > 5.0 {
        tsb.green()
    } else {
        tsb.yellow()
    };
    format!(
        "{} CTL {:.1} | ATL {:.1} | TSB {} ({})\n  {}",
        latest.date.to_string().bold(),
        latest.load.ctl,
        latest.load.atl,
        tsb,
        interpretation.description(),
        interpretation.recommendation().dimmed()
    )
}

fn severity_marker(severity: InsightSeverity) -> ColoredString {
    match severity {
        InsightSeverity::Positive => "+".green().bold(),
        InsightSeverity::Info => "i".blue().bold(),
        InsightSeverity::Warning => "!".yellow().bold(),
    }
}

/// Insights as a marked list
pub fn insight_lines(insights: &[Insight]) -> String {
    insights
        .iter()
        .map(|insight| {
            let mut line = format!(
                "[{}] {} {}",
                severity_marker(insight.severity),
                format!("({})", insight.category).dimmed(),
                insight.message
            );
            if let Some(stat) = &insight.statistic {
                line.push_str(&format!(" {}", format!("[{} = {:.3}]", stat.name, stat.value).dimmed()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Tabled)]
struct CorrelationRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "r")]
    coefficient: String,
    #[tabled(rename = "Strength")]
    strength: String,
}

fn strength_label(r: f64) -> &'static str {
    match r.abs() {
        a if a >= 0.7 => "strong",
        a if a >= 0.5 => "moderate",
        a if a >= 0.3 => "weak",
        _ => "negligible",
    }
}

/// Top correlations of a report against its target
pub fn correlation_table(report: &CorrelationReport) -> String {
    let rows: Vec<CorrelationRow> = report
        .top
        .iter()
        .map(|(column, r)| CorrelationRow {
            column: column.clone(),
            coefficient: format!("{:+.3}", r),
            strength: strength_label(*r).to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Significance stars for a p-value
pub fn significance_stars(p_value: f64) -> &'static str {
    match SignificanceLevel::from_p_value(p_value) {
        SignificanceLevel::VeryStrong => "***",
        SignificanceLevel::Strong => "**",
        SignificanceLevel::Moderate => "*",
        SignificanceLevel::Weak => ".",
        SignificanceLevel::NotSignificant => "",
    }
}

/// Text summary of a series profile; `dates` label the profiled values
pub fn profile_lines(profile: &SeriesProfile, dates: &[NaiveDate]) -> String {
    let mut lines = Vec::new();
    match &profile.summary {
        Some(summary) => lines.push(format!(
            "n = {} | mean {:.2} | std {:.2} | min {:.2} | max {:.2}",
            summary.count, summary.mean, summary.std, summary.min, summary.max
        )),
        None => return "No observations".yellow().to_string(),
    }
    if let Some(shape) = &profile.distribution {
        lines.push(format!(
            "median {:.2} | IQR {:.2} | skew {:+.2} | kurtosis {:+.2}",
            shape.median, shape.iqr, shape.skewness, shape.kurtosis
        ));
    }
    if let Some(normality) = &profile.normality {
        let verdict = if normality.normal {
            "looks normal".green()
        } else {
            "not normal".yellow()
        };
        lines.push(format!("Jarque-Bera p = {:.4} ({})", normality.p_value, verdict));
    }
    if let Some(trend) = &profile.trend {
        lines.push(format!(
            "trend {:+.3} per entry (r^2 = {:.2}){}",
            trend.slope,
            trend.r_squared(),
            trend.p_value.map_or("", significance_stars)
        ));
    }
    if let Some(Some(latest)) = profile.rolling.mean.last() {
        lines.push(format!("latest rolling mean {:.2}", latest));
    }
    if !profile.outliers.is_empty() {
        let days: Vec<String> = profile
            .outliers
            .indices
            .iter()
            .filter_map(|&i| dates.get(i).map(|d| d.to_string()))
            .collect();
        lines.push(format!("{} {}", "outliers:".red(), days.join(", ")));
    }
    if !profile.change_points.is_empty() {
        let days: Vec<String> = profile
            .change_points
            .iter()
            .filter_map(|&i| dates.get(i).map(|d| d.to_string()))
            .collect();
        lines.push(format!("shifts near: {}", days.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{InsightCategory, SupportingStatistic};
    use crate::config::StatisticsConfig;
    use crate::pmc::DailyLoad;
    use crate::statistics::profile_series;

    fn record(day: u32, tsb: f64) -> DailyLoadRecord {
        DailyLoadRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            trimp: 300.0,
            session_count: 1,
            load: DailyLoad {
                tss: 50.0,
                ctl: 40.0,
                atl: 40.0 - tsb,
                tsb,
                monotony: None,
                strain: None,
                readiness_from_tsb: 50,
                volume_reduction_pct: 25.0,
            },
        }
    }

    #[test]
    fn test_load_table_limits_to_recent_days() {
        colored::control::set_override(false);
        let records: Vec<_> = (1..=5).map(|d| record(d, 0.0)).collect();
        let table = load_table(&records, 2);
        assert!(table.contains("2024-03-05"));
        assert!(table.contains("2024-03-04"));
        assert!(!table.contains("2024-03-03"));
        assert!(table.contains("Monotony"));
    }

    #[test]
    fn test_insight_lines_include_statistic() {
        colored::control::set_override(false);
        let insights = vec![Insight {
            category: InsightCategory::Trend,
            rule: "readiness_trend".to_string(),
            message: "Readiness is improving".to_string(),
            statistic: Some(SupportingStatistic {
                name: "delta".to_string(),
                value: 6.5,
            }),
            severity: InsightSeverity::Positive,
        }];
        let text = insight_lines(&insights);
        assert!(text.contains("Readiness is improving"));
        assert!(text.contains("delta = 6.500"));
        assert!(text.starts_with("[+]"));
    }

    #[test]
    fn test_strength_and_stars() {
        assert_eq!(strength_label(-0.82), "strong");
        assert_eq!(strength_label(0.55), "moderate");
        assert_eq!(strength_label(0.1), "negligible");
        assert_eq!(significance_stars(0.0004), "***");
        assert_eq!(significance_stars(0.2), "");
    }

    #[test]
    fn test_profile_lines_name_outlier_days() {
        colored::control::set_override(false);
        let dates: Vec<NaiveDate> = (1..=10)
            .map(|d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
            .collect();
        let values = [5.0, 5.5, 4.5, 5.0, 5.2, 4.8, 9.0, 5.1, 4.9, 5.0];
        let profile = profile_series(&values, &StatisticsConfig::default());

        let text = profile_lines(&profile, &dates);
        assert!(text.starts_with("n = 10"));
        assert!(text.contains("outliers: 2024-03-07"));
        assert!(text.contains("Jarque-Bera"));

        let empty = profile_series(&[f64::NAN], &StatisticsConfig::default());
        assert_eq!(profile_lines(&empty, &dates[..1]), "No observations");
    }
}
