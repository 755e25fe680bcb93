// Library interface for athlete-monitor
// Integration tests and the CLI reach the analytics core through here

pub mod config;
pub mod correlator;
pub mod display;
pub mod error;
pub mod import;
pub mod insights;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod pmc;
pub mod scores;
pub mod statistics;
pub mod store;
pub mod window;

// Re-export commonly used types for convenience
pub use config::{AnalyticsConfig, InsightConfig, LocaleLabels, StatisticsConfig};
pub use correlator::{AlignedFrame, CorrelationReport, CrossModuleCorrelator};
pub use error::{AthleteMonitorError, Result};
pub use import::CsvImporter;
pub use insights::{generate_insights, Insight, InsightCategory, InsightEngine, InsightSeverity};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use normalizer::{
    normalize_psychological, normalize_readiness, normalize_training, DailySeries, DateRange,
    PsychologicalDay, ReadinessDay, TrainingDay, MAX_WINDOW_DAYS,
};
pub use pmc::{compute_daily_load, DailyLoad, DailyLoadRecord, PmcCalculator, PmcConfig};
pub use scores::{
    component_contributions, compute_dass_score, compute_readiness_score, ReadinessFormula,
    WeightTable,
};
pub use statistics::{correlate, partial_correlation, Correlation, CorrelationMethod};
pub use store::{InMemoryStore, RecordId, RecordStore, UserHistory};
pub use window::{select_load_rows, AnalysisWindow};
