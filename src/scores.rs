//! Score calculators for single records
//!
//! One versioned home for the readiness, DASS, TRIMP and TSS formulas.
//! Readiness weights are data ([`WeightTable`]) so the product can pin or
//! migrate a table version without touching call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ReadinessComponents;

/// Tolerance used when checking that a weight table sums to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Questionnaire components contributing to the readiness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessComponent {
    SleepQuality,
    SleepDuration,
    Stress,
    MuscleSoreness,
    Energy,
    Motivation,
    Nutrition,
    Hydration,
    Fatigue,
}

impl ReadinessComponent {
    pub const ALL: [ReadinessComponent; 9] = [
        ReadinessComponent::SleepQuality,
        ReadinessComponent::SleepDuration,
        ReadinessComponent::Stress,
        ReadinessComponent::MuscleSoreness,
        ReadinessComponent::Energy,
        ReadinessComponent::Motivation,
        ReadinessComponent::Nutrition,
        ReadinessComponent::Hydration,
        ReadinessComponent::Fatigue,
    ];

    /// Whether lower raw ratings are better (inverted as `6 - raw`)
    pub fn is_inverted(&self) -> bool {
        matches!(
            self,
            ReadinessComponent::Stress
                | ReadinessComponent::MuscleSoreness
                | ReadinessComponent::Fatigue
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadinessComponent::SleepQuality => "sleep quality",
            ReadinessComponent::SleepDuration => "sleep duration",
            ReadinessComponent::Stress => "stress level",
            ReadinessComponent::MuscleSoreness => "muscle soreness",
            ReadinessComponent::Energy => "energy",
            ReadinessComponent::Motivation => "motivation",
            ReadinessComponent::Nutrition => "nutrition",
            ReadinessComponent::Hydration => "hydration",
            ReadinessComponent::Fatigue => "fatigue",
        }
    }
}

impl fmt::Display for ReadinessComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Versioned readiness weight table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    /// Table version, bumped whenever a weight changes
    pub version: u32,
    pub name: String,
    pub sleep_quality: f64,
    pub sleep_duration: f64,
    pub stress: f64,
    pub muscle_soreness: f64,
    pub energy: f64,
    pub motivation: f64,
    pub nutrition: f64,
    pub hydration: f64,
    #[serde(default)]
    pub fatigue: f64,
}

impl WeightTable {
    /// Canonical eight-component table (v2)
    pub fn canonical() -> Self {
        Self {
            version: 2,
            name: "canonical".to_string(),
            sleep_quality: 0.20,
            sleep_duration: 0.15,
            stress: 0.15,
            muscle_soreness: 0.15,
            energy: 0.15,
            motivation: 0.10,
            nutrition: 0.05,
            hydration: 0.05,
            fatigue: 0.0,
        }
    }

    /// Nine-component table with fatigue folded in (v1)
    pub fn legacy_with_fatigue() -> Self {
        Self {
            version: 1,
            name: "legacy-fatigue".to_string(),
            sleep_quality: 0.20,
            sleep_duration: 0.15,
            stress: 0.15,
            muscle_soreness: 0.10,
            energy: 0.10,
            motivation: 0.05,
            nutrition: 0.05,
            hydration: 0.05,
            fatigue: 0.15,
        }
    }

    /// Sleep- and stress-heavy eight-component table
    pub fn literature() -> Self {
        Self {
            version: 3,
            name: "literature".to_string(),
            sleep_quality: 0.25,
            sleep_duration: 0.15,
            stress: 0.20,
            muscle_soreness: 0.15,
            energy: 0.15,
            motivation: 0.05,
            nutrition: 0.03,
            hydration: 0.02,
            fatigue: 0.0,
        }
    }

    pub fn weight(&self, component: ReadinessComponent) -> f64 {
        match component {
            ReadinessComponent::SleepQuality => self.sleep_quality,
            ReadinessComponent::SleepDuration => self.sleep_duration,
            ReadinessComponent::Stress => self.stress,
            ReadinessComponent::MuscleSoreness => self.muscle_soreness,
            ReadinessComponent::Energy => self.energy,
            ReadinessComponent::Motivation => self.motivation,
            ReadinessComponent::Nutrition => self.nutrition,
            ReadinessComponent::Hydration => self.hydration,
            ReadinessComponent::Fatigue => self.fatigue,
        }
    }

    pub fn total(&self) -> f64 {
        ReadinessComponent::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    /// Every weight must be in [0, 1] and the table must sum to one
    pub fn validate(&self) -> Result<(), String> {
        for component in ReadinessComponent::ALL {
            let weight = self.weight(component);
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(format!(
                    "weight for {} must be within [0, 1], got {}",
                    component, weight
                ));
            }
        }

        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(format!(
                "weight table '{}' v{} sums to {:.4}, expected 1.0",
                self.name, self.version, total
            ));
        }
        Ok(())
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Mapping from hours slept onto the 1-5 rating scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SleepDurationScale {
    /// `clamp(1, 5, (hours - floor_hours) / hours_per_point + 1)`
    Linear {
        floor_hours: f64,
        hours_per_point: f64,
    },
    /// `clamp(1, 5, hours / target_hours * 5)`
    Target { target_hours: f64 },
}

impl SleepDurationScale {
    pub fn normalize(&self, hours: f64) -> f64 {
        let raw = match self {
            SleepDurationScale::Linear {
                floor_hours,
                hours_per_point,
            } => {
                if *hours_per_point <= 0.0 {
                    return 1.0;
                }
                (hours - floor_hours) / hours_per_point + 1.0
            }
            SleepDurationScale::Target { target_hours } => {
                if *target_hours <= 0.0 {
                    return 1.0;
                }
                hours / target_hours * 5.0
            }
        };
        raw.clamp(1.0, 5.0)
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            SleepDurationScale::Linear {
                hours_per_point, ..
            } if *hours_per_point <= 0.0 => {
                Err("sleep scale hours_per_point must be positive".to_string())
            }
            SleepDurationScale::Target { target_hours } if *target_hours <= 0.0 => {
                Err("sleep scale target_hours must be positive".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl Default for SleepDurationScale {
    fn default() -> Self {
        SleepDurationScale::Linear {
            floor_hours: 4.0,
            hours_per_point: 1.5,
        }
    }
}

/// A complete, versioned readiness formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadinessFormula {
    pub weights: WeightTable,
    pub sleep_scale: SleepDurationScale,
}

impl ReadinessFormula {
    pub fn validate(&self) -> Result<(), String> {
        self.weights.validate()?;
        self.sleep_scale.validate()
    }

    /// Component values on the 1-5 scale after inversion and sleep normalization.
    /// Components absent from the record are omitted.
    pub fn normalized_components(
        &self,
        components: &ReadinessComponents,
    ) -> Vec<(ReadinessComponent, f64)> {
        let invert = |raw: u8| 6.0 - f64::from(raw);
        let mut values = vec![
            (
                ReadinessComponent::SleepQuality,
                f64::from(components.sleep_quality),
            ),
            (
                ReadinessComponent::SleepDuration,
                self.sleep_scale.normalize(components.sleep_duration_hours),
            ),
            (ReadinessComponent::Stress, invert(components.stress)),
            (
                ReadinessComponent::MuscleSoreness,
                invert(components.muscle_soreness),
            ),
            (ReadinessComponent::Energy, f64::from(components.energy)),
            (ReadinessComponent::Motivation, f64::from(components.motivation)),
            (ReadinessComponent::Nutrition, f64::from(components.nutrition)),
            (ReadinessComponent::Hydration, f64::from(components.hydration)),
        ];
        if let Some(fatigue) = components.fatigue {
            values.push((ReadinessComponent::Fatigue, invert(fatigue)));
        }
        values
    }
}

/// Readiness score (0-100) for one questionnaire.
///
/// Weighted mean of the normalized components, mapped from [1, 5] onto
/// [0, 100] via `(weighted - 1) * 25`. Weights of components missing from the
/// record are redistributed over the present ones.
pub fn readiness_score(components: &ReadinessComponents, formula: &ReadinessFormula) -> u8 {
    let total: f64 = component_contributions(components, formula)
        .iter()
        .map(|(_, points)| points)
        .sum();
    total.round().clamp(0.0, 100.0) as u8
}

/// Points each component adds to the readiness score: `(value - 1) * 25`
/// times its weight share among the components present.
///
/// The contributions sum to the unrounded score. Empty when every present
/// component has zero weight.
pub fn component_contributions(
    components: &ReadinessComponents,
    formula: &ReadinessFormula,
) -> Vec<(ReadinessComponent, f64)> {
    let normalized = formula.normalized_components(components);
    let weight_total: f64 = normalized
        .iter()
        .map(|(component, _)| formula.weights.weight(*component))
        .sum();
    if weight_total <= 0.0 {
        return Vec::new();
    }

    normalized
        .into_iter()
        .map(|(component, value)| {
            let share = formula.weights.weight(component) / weight_total;
            (component, (value - 1.0) * 25.0 * share)
        })
        .collect()
}

/// Readiness score under the canonical formula
pub fn compute_readiness_score(components: &ReadinessComponents) -> u8 {
    readiness_score(components, &ReadinessFormula::default())
}

/// DASS score (0-100, higher is better): `100 - mean(triplet) * 100 / 3`
pub fn dass_score(anxiety: u8, depression: u8, stress: u8) -> u8 {
    let mean = (f64::from(anxiety) + f64::from(depression) + f64::from(stress)) / 3.0;
    (100.0 - mean * 100.0 / 3.0).round().clamp(0.0, 100.0) as u8
}

/// DASS score from an `(anxiety, depression, stress)` triplet
pub fn compute_dass_score(triplet: (u8, u8, u8)) -> u8 {
    dass_score(triplet.0, triplet.1, triplet.2)
}

/// Training impulse: `duration_minutes * rpe`
pub fn trimp(duration_minutes: f64, rpe: f64) -> f64 {
    duration_minutes * rpe
}

/// Session-RPE TSS: `(duration_minutes * 60) * (rpe / 10)^2 * 100 / 3600`.
///
/// Full precision; round only for display.
pub fn tss(duration_minutes: f64, rpe: f64) -> f64 {
    let intensity_factor = rpe / 10.0;
    duration_minutes * 60.0 * intensity_factor.powi(2) * 100.0 / 3600.0
}

/// Interpretation bands for a readiness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadinessLevel {
    Excellent, // 85 and above
    Good,      // 70 to 84
    Moderate,  // 55 to 69
    Low,       // 40 to 54
    VeryLow,   // below 40
}

impl ReadinessLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => ReadinessLevel::Excellent,
            70..=84 => ReadinessLevel::Good,
            55..=69 => ReadinessLevel::Moderate,
            40..=54 => ReadinessLevel::Low,
            _ => ReadinessLevel::VeryLow,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReadinessLevel::Excellent => "Excellent readiness, ideal for high intensity or competition",
            ReadinessLevel::Good => "Good readiness, suitable for moderate to high intensity",
            ReadinessLevel::Moderate => "Moderate readiness, keep intensity medium",
            ReadinessLevel::Low => "Low readiness, light training or active rest",
            ReadinessLevel::VeryLow => "Very low readiness, prioritize rest and recovery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uniform(rating: u8, hours: f64) -> ReadinessComponents {
        ReadinessComponents {
            sleep_quality: rating,
            sleep_duration_hours: hours,
            stress: 6 - rating,
            muscle_soreness: 6 - rating,
            energy: rating,
            motivation: rating,
            nutrition: rating,
            hydration: rating,
            fatigue: None,
        }
    }

    #[test]
    fn test_named_tables_sum_to_one() {
        for table in [
            WeightTable::canonical(),
            WeightTable::legacy_with_fatigue(),
            WeightTable::literature(),
        ] {
            assert!(table.validate().is_ok(), "{} failed", table.name);
        }
    }

    #[test]
    fn test_table_validation_rejects_bad_sum() {
        let mut table = WeightTable::canonical();
        table.muscle_soreness = 0.10;
        assert!(table.validate().is_err());

        let mut table = WeightTable::canonical();
        table.energy = -0.05;
        table.motivation = 0.30;
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_sleep_duration_normalization() {
        let scale = SleepDurationScale::default();
        assert_eq!(scale.normalize(4.0), 1.0);
        assert_eq!(scale.normalize(2.0), 1.0);
        assert_eq!(scale.normalize(10.0), 5.0);
        assert_eq!(scale.normalize(12.0), 5.0);
        assert!((scale.normalize(8.0) - (4.0 / 1.5 + 1.0)).abs() < 1e-12);

        let target = SleepDurationScale::Target { target_hours: 8.0 };
        assert_eq!(target.normalize(8.0), 5.0);
        assert_eq!(target.normalize(4.0), 2.5);
        assert_eq!(target.normalize(0.5), 1.0);
    }

    #[test]
    fn test_readiness_extremes() {
        assert_eq!(compute_readiness_score(&uniform(5, 10.0)), 100);
        assert_eq!(compute_readiness_score(&uniform(1, 4.0)), 0);
    }

    #[test]
    fn test_readiness_form_with_eight_hours_sleep() {
        // 8h maps to 3.67 on the linear scale: 0.15 * (5 - 3.67) * 25 = 5 points short.
        assert_eq!(compute_readiness_score(&uniform(5, 8.0)), 95);

        let target_formula = ReadinessFormula {
            weights: WeightTable::canonical(),
            sleep_scale: SleepDurationScale::Target { target_hours: 8.0 },
        };
        assert_eq!(readiness_score(&uniform(5, 8.0), &target_formula), 100);
    }

    #[test]
    fn test_fatigue_table_renormalizes_missing_component() {
        let formula = ReadinessFormula {
            weights: WeightTable::legacy_with_fatigue(),
            ..ReadinessFormula::default()
        };
        let mut best = uniform(5, 10.0);
        assert_eq!(readiness_score(&best, &formula), 100);

        best.fatigue = Some(5);
        // Worst fatigue costs 0.15 * 4 * 25 = 15 points
        assert_eq!(readiness_score(&best, &formula), 85);

        // The canonical table ignores fatigue entirely
        assert_eq!(compute_readiness_score(&best), 100);
    }

    #[test]
    fn test_inverted_components() {
        let mut components = uniform(5, 10.0);
        components.stress = 5;
        // 0.15 * (5 - 1) * 25 = 15
        assert_eq!(compute_readiness_score(&components), 85);
    }

    #[test]
    fn test_component_contributions_sum_to_score() {
        let components = ReadinessComponents {
            sleep_quality: 4,
            sleep_duration_hours: 7.0,
            stress: 2,
            muscle_soreness: 3,
            energy: 5,
            motivation: 3,
            nutrition: 4,
            hydration: 2,
            fatigue: None,
        };
        let formula = ReadinessFormula::default();
        let contributions = component_contributions(&components, &formula);
        assert_eq!(contributions.len(), 8);

        let total: f64 = contributions.iter().map(|(_, p)| p).sum();
        assert_eq!(total.round() as u8, readiness_score(&components, &formula));

        let energy = contributions
            .iter()
            .find(|(c, _)| *c == ReadinessComponent::Energy)
            .unwrap();
        // 0.15 * (5 - 1) * 25
        assert!((energy.1 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_contributions_worst_answers_are_zero() {
        let contributions = component_contributions(&uniform(1, 3.0), &ReadinessFormula::default());
        assert!(contributions.iter().all(|(_, p)| *p == 0.0));
    }

    #[test]
    fn test_contributions_with_zero_weights() {
        let mut weights = WeightTable::canonical();
        for component in ReadinessComponent::ALL {
            match component {
                ReadinessComponent::SleepQuality => weights.sleep_quality = 0.0,
                ReadinessComponent::SleepDuration => weights.sleep_duration = 0.0,
                ReadinessComponent::Stress => weights.stress = 0.0,
                ReadinessComponent::MuscleSoreness => weights.muscle_soreness = 0.0,
                ReadinessComponent::Energy => weights.energy = 0.0,
                ReadinessComponent::Motivation => weights.motivation = 0.0,
                ReadinessComponent::Nutrition => weights.nutrition = 0.0,
                ReadinessComponent::Hydration => weights.hydration = 0.0,
                ReadinessComponent::Fatigue => weights.fatigue = 0.0,
            }
        }
        let formula = ReadinessFormula {
            weights,
            ..ReadinessFormula::default()
        };
        assert!(component_contributions(&uniform(5, 10.0), &formula).is_empty());
        assert_eq!(readiness_score(&uniform(5, 10.0), &formula), 0);
    }

    #[test]
    fn test_dass_score() {
        assert_eq!(dass_score(0, 0, 0), 100);
        assert_eq!(dass_score(3, 3, 3), 0);
        assert_eq!(compute_dass_score((1, 2, 0)), 67);
        assert_eq!(compute_dass_score((3, 0, 0)), 67);
    }

    #[test]
    fn test_trimp_and_tss() {
        assert_eq!(trimp(60.0, 5.0), 300.0);
        assert_eq!(trimp(45.0, 0.0), 0.0);
        // One hour at RPE 10 is the reference 100 TSS
        assert!((tss(60.0, 10.0) - 100.0).abs() < 1e-9);
        assert!((tss(90.0, 6.0) - 54.0).abs() < 1e-9);
        assert!((tss(50.0, 3.0) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_readiness_level_bands() {
        assert_eq!(ReadinessLevel::from_score(100), ReadinessLevel::Excellent);
        assert_eq!(ReadinessLevel::from_score(85), ReadinessLevel::Excellent);
        assert_eq!(ReadinessLevel::from_score(70), ReadinessLevel::Good);
        assert_eq!(ReadinessLevel::from_score(60), ReadinessLevel::Moderate);
        assert_eq!(ReadinessLevel::from_score(40), ReadinessLevel::Low);
        assert_eq!(ReadinessLevel::from_score(0), ReadinessLevel::VeryLow);
    }

    proptest! {
        #[test]
        fn test_readiness_score_bounded(
            sleep_quality in 1u8..=5,
            hours in 0.0f64..=24.0,
            stress in 1u8..=5,
            soreness in 1u8..=5,
            energy in 1u8..=5,
            motivation in 1u8..=5,
            nutrition in 1u8..=5,
            hydration in 1u8..=5,
            fatigue in proptest::option::of(1u8..=5),
        ) {
            let components = ReadinessComponents {
                sleep_quality,
                sleep_duration_hours: hours,
                stress,
                muscle_soreness: soreness,
                energy,
                motivation,
                nutrition,
                hydration,
                fatigue,
            };
            for weights in [WeightTable::canonical(), WeightTable::legacy_with_fatigue(), WeightTable::literature()] {
                let formula = ReadinessFormula { weights, ..ReadinessFormula::default() };
                let score = readiness_score(&components, &formula);
                prop_assert!(score <= 100);
            }
        }

        #[test]
        fn test_dass_score_monotone(anxiety in 0u8..=3, depression in 0u8..=3, stress in 0u8..=2) {
            prop_assert!(dass_score(anxiety, depression, stress) >= dass_score(anxiety, depression, stress + 1));
        }
    }
}
