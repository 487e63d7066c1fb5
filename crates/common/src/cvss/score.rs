// CVSS v4.0 scoring: macro-vector classification and interpolation within
// the macro-vector's severity bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lookup;
use super::selection::CvssSelection;
use super::values::{
    AttackComplexity, AttackRequirements, AttackVector, ExploitMaturity, PrivilegesRequired,
    Requirement, SafetyImpact, ScoringVector, SubsequentImpact, UserInteraction, VulnerableImpact,
};

const STEP: f64 = 0.1;

/// Equivalence-class digits EQ1..EQ6 of a metric vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacroVector {
    pub eq1: u8,
    pub eq2: u8,
    pub eq3: u8,
    pub eq4: u8,
    pub eq5: u8,
    pub eq6: u8,
}

impl MacroVector {
    /// Classify typed effective values.
    pub fn classify(values: &ScoringVector) -> Self {
        let ScoringVector { av, ac, at, pr, ui, vc, vi, va, sc, si, sa, e, cr, ir, ar } = *values;

        let eq1 = if av == AttackVector::Network
            && pr == PrivilegesRequired::None
            && ui == UserInteraction::None
        {
            0
        } else if (av == AttackVector::Network
            || pr == PrivilegesRequired::None
            || ui == UserInteraction::None)
            && av != AttackVector::Physical
        {
            1
        } else {
            2
        };

        let eq2 = if ac == AttackComplexity::Low && at == AttackRequirements::None { 0 } else { 1 };

        let high = VulnerableImpact::High;
        let eq3 = if vc == high && vi == high {
            0
        } else if vc == high || vi == high || va == high {
            1
        } else {
            2
        };

        let eq4 = if si == SafetyImpact::Safety || sa == SafetyImpact::Safety {
            0
        } else if sc == SubsequentImpact::High
            || si == SafetyImpact::High
            || sa == SafetyImpact::High
        {
            1
        } else {
            2
        };

        let eq5 = match e {
            ExploitMaturity::Attacked => 0,
            ExploitMaturity::ProofOfConcept => 1,
            ExploitMaturity::Unreported => 2,
        };

        let eq6 = if (cr == Requirement::High && vc == high)
            || (ir == Requirement::High && vi == high)
            || (ar == Requirement::High && va == high)
        {
            0
        } else {
            1
        };

        Self { eq1, eq2, eq3, eq4, eq5, eq6 }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Table score for this macro-vector, if it exists.
    pub fn score(&self) -> Option<f64> {
        lookup::macro_vector_score(&self.key())
    }

    fn with(self, eq1: u8, eq2: u8, eq3: u8, eq4: u8, eq5: u8, eq6: u8) -> Self {
        Self {
            eq1: self.eq1 + eq1,
            eq2: self.eq2 + eq2,
            eq3: self.eq3 + eq3,
            eq4: self.eq4 + eq4,
            eq5: self.eq5 + eq5,
            eq6: self.eq6 + eq6,
        }
    }

    /// Score of the next lower macro-vector along the joint EQ3/EQ6 axis.
    ///
    /// (0,0) has two lower neighbours, (0,1) and (1,0); the higher-scoring one
    /// is used. (2,1) has none.
    fn eq3_eq6_next_lower_score(self) -> Option<f64> {
        match (self.eq3, self.eq6) {
            (0, 0) => {
                let left = self.with(0, 0, 0, 0, 0, 1).score();
                let right = self.with(0, 0, 1, 0, 0, 0).score();
                match (left, right) {
                    (Some(left), Some(right)) => Some(if left > right { left } else { right }),
                    (left, right) => left.or(right),
                }
            }
            (0, 1) | (1, 1) => self.with(0, 0, 1, 0, 0, 0).score(),
            (1, 0) => self.with(0, 0, 0, 0, 0, 1).score(),
            _ => self.with(0, 0, 1, 0, 0, 1).score(),
        }
    }

    /// Full vectors of highest severity within this macro-vector, in
    /// enumeration order (EQ1 outermost, EQ5 innermost).
    fn max_vectors(self) -> Vec<ScoringVector> {
        let mut vectors = Vec::new();
        for &(av, pr, ui) in lookup::eq1_maxes(self.eq1) {
            for &(ac, at) in lookup::eq2_maxes(self.eq2) {
                for &(vc, vi, va, cr, ir, ar) in lookup::eq3_eq6_maxes(self.eq3, self.eq6) {
                    for &(sc, si, sa) in lookup::eq4_maxes(self.eq4) {
                        for &e in lookup::eq5_maxes(self.eq5) {
                            vectors.push(ScoringVector {
                                av, ac, at, pr, ui, vc, vi, va, sc, si, sa, e, cr, ir, ar,
                            });
                        }
                    }
                }
            }
        }
        vectors
    }
}

impl fmt::Display for MacroVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}{}{}", self.eq1, self.eq2, self.eq3, self.eq4, self.eq5, self.eq6)
    }
}

/// Qualitative severity rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score <= 0.0 {
            Self::None
        } else if score < 4.0 {
            Self::Low
        } else if score < 7.0 {
            Self::Medium
        } else if score < 9.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-metric distance from the current values to one max vector.
fn distances_to(current: &ScoringVector, max_vector: &ScoringVector) -> [f64; 14] {
    let mut distances = current.levels();
    for (distance, max_level) in distances.iter_mut().zip(max_vector.levels()) {
        *distance -= max_level;
    }
    distances
}

/// Compute the CVSS v4.0 score of a selection, rounded to one decimal.
pub fn score(selection: &CvssSelection) -> f64 {
    let Some(values) = ScoringVector::from_selection(selection) else {
        tracing::warn!(vector = %selection.vector(), "effective values outside the scoring codes");
        return 0.0;
    };
    if values.has_no_impact() {
        return 0.0;
    }

    let macro_vector = MacroVector::classify(&values);
    let Some(value) = macro_vector.score() else {
        tracing::warn!(macro_vector = %macro_vector, "macro-vector missing from lookup table");
        return 0.0;
    };

    let next_lower = [
        macro_vector.with(1, 0, 0, 0, 0, 0).score(),
        macro_vector.with(0, 1, 0, 0, 0, 0).score(),
        macro_vector.eq3_eq6_next_lower_score(),
        macro_vector.with(0, 0, 0, 1, 0, 0).score(),
        macro_vector.with(0, 0, 0, 0, 1, 0).score(),
    ];

    // The first max vector no metric of the selection exceeds in severity.
    let candidates = macro_vector.max_vectors();
    let mut distances = [0.0; 14];
    for candidate in &candidates {
        distances = distances_to(&values, candidate);
        if distances.iter().all(|distance| *distance >= 0.0) {
            break;
        }
    }
    let [av, pr, ui, ac, at, vc, vi, va, sc, si, sa, cr, ir, ar] = distances;

    let current = [
        av + pr + ui,
        ac + at,
        vc + vi + va + cr + ir + ar,
        sc + si + sa,
        // EQ5 has no intra-class distance.
        0.0,
    ];
    let max_depth = [
        lookup::eq1_max_depth(macro_vector.eq1),
        lookup::eq2_max_depth(macro_vector.eq2),
        lookup::eq3_eq6_max_depth(macro_vector.eq3, macro_vector.eq6),
        lookup::eq4_max_depth(macro_vector.eq4),
        None,
    ];

    let mut existing_lower = 0u32;
    let mut normalized_sum = 0.0;
    for ((lower, distance), depth) in next_lower.into_iter().zip(current).zip(max_depth) {
        let Some(lower) = lower else {
            continue;
        };
        existing_lower += 1;
        let available = value - lower;
        let percent = match depth {
            Some(depth) => distance / (f64::from(depth) * STEP),
            None => 0.0,
        };
        normalized_sum += available * percent;
    }

    let mean_distance =
        if existing_lower == 0 { 0.0 } else { normalized_sum / f64::from(existing_lower) };

    round_to_tenth((value - mean_distance).clamp(0.0, 10.0))
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
