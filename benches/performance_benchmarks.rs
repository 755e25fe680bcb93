use athlete_monitor::{insights, normalizer, pmc, statistics};
use athlete_monitor::models::{ReadinessComponents, ReadinessRecord, TrainingRecord};
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Performance benchmarks for the analytics core
///
/// Dataset sizes cover a week up to several years of daily logging.

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

fn create_tss_series(days: usize) -> Vec<f64> {
    (0..days)
        .map(|i| if i % 7 == 6 { 0.0 } else { 40.0 + (i % 5) as f64 * 15.0 })
        .collect()
}

fn create_training_records(days: usize) -> Vec<TrainingRecord> {
    (0..days)
        .filter(|i| i % 7 != 6)
        .map(|i| {
            TrainingRecord::new(
                start() + Duration::days(i as i64),
                45.0 + (i % 3) as f64 * 15.0,
                4.0 + (i % 5) as f64,
            )
            .unwrap()
        })
        .collect()
}

fn create_readiness_records(days: usize) -> Vec<ReadinessRecord> {
    (0..days)
        .map(|i| {
            let level = 2 + (i % 4) as u8;
            ReadinessRecord::new(
                start() + Duration::days(i as i64),
                ReadinessComponents {
                    sleep_quality: level,
                    sleep_duration_hours: 6.0 + (i % 3) as f64,
                    stress: 6 - level,
                    muscle_soreness: 3,
                    energy: level,
                    motivation: 4,
                    nutrition: 3,
                    hydration: 4,
                    fatigue: None,
                },
            )
            .unwrap()
        })
        .collect()
}

fn bench_daily_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("Daily Load");
    let calculator = pmc::PmcCalculator::new();

    for &days in &[7, 90, 365, 1825] {
        let series = create_tss_series(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("compute_daily_load", days),
            &series,
            |b, series| {
                b.iter(|| calculator.compute_daily_load(black_box(series)));
            },
        );
    }

    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("Statistics");

    for &n in &[30, 365, 1825] {
        let a: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 10.0 + 50.0).collect();
        let b: Vec<f64> = (0..n).map(|i| (i as f64 * 0.41).cos() * 8.0 + 60.0).collect();

        group.throughput(Throughput::Elements(n as u64));
        for method in [
            statistics::CorrelationMethod::Pearson,
            statistics::CorrelationMethod::Spearman,
            statistics::CorrelationMethod::Kendall,
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("correlate_{}", method), n),
                &(a.clone(), b.clone()),
                |bench, (a, b)| {
                    bench.iter(|| statistics::correlate(black_box(a), black_box(b), method));
                },
            );
        }
        group.bench_with_input(BenchmarkId::new("rolling_stats", n), &a, |bench, a| {
            bench.iter(|| statistics::rolling_stats(black_box(a), 7, 1));
        });
        group.bench_with_input(BenchmarkId::new("profile_series", n), &a, |bench, a| {
            let config = athlete_monitor::StatisticsConfig::default();
            bench.iter(|| statistics::profile_series(black_box(a), &config));
        });
    }

    group.finish();
}

fn bench_insights(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insights");

    for &days in &[30, 180, 365] {
        let range = normalizer::DateRange::ending_on(start() + Duration::days(days as i64 - 1), days as u32)
            .unwrap();
        let readiness = normalizer::normalize_readiness(&create_readiness_records(days), &range);
        let training = normalizer::normalize_training(&create_training_records(days), &range);
        let psychological = normalizer::normalize_psychological(&[], &range);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_function(BenchmarkId::new("generate_insights", days), |b| {
            b.iter(|| {
                insights::generate_insights(
                    black_box(&readiness),
                    black_box(&training),
                    black_box(&psychological),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_daily_load, bench_statistics, bench_insights);
criterion_main!(benches);
