// Typed effective values of the metrics that take part in scoring.
//
// The metric catalogue draws its value lists for these metrics from the
// codes declared here, so every effective value of a selection converts.

use super::metrics::{Metric, NOT_DEFINED};
use super::selection::CvssSelection;

macro_rules! scoring_value {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($code:literal, $level:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Value codes, most severe first.
            pub const CODES: &'static [&'static str] = &[$($code),+];

            /// Value codes preceded by the not-defined marker.
            pub const OPTIONAL_CODES: &'static [&'static str] = &[NOT_DEFINED, $($code),+];

            pub const fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }

            /// Distance from the most severe value, in scoring units.
            pub fn level(self) -> f64 {
                match self {
                    $(Self::$variant => $level),+
                }
            }

            pub fn from_code(code: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|value| value.code() == code)
            }
        }
    };
}

scoring_value!(AttackVector {
    Network => ("N", 0.0),
    Adjacent => ("A", 0.1),
    Local => ("L", 0.2),
    Physical => ("P", 0.3),
});

scoring_value!(AttackComplexity {
    Low => ("L", 0.0),
    High => ("H", 0.1),
});

scoring_value!(AttackRequirements {
    None => ("N", 0.0),
    Present => ("P", 0.1),
});

scoring_value!(PrivilegesRequired {
    None => ("N", 0.0),
    Low => ("L", 0.1),
    High => ("H", 0.2),
});

scoring_value!(UserInteraction {
    None => ("N", 0.0),
    Passive => ("P", 0.1),
    Active => ("A", 0.2),
});

scoring_value!(
    /// Confidentiality, integrity or availability impact on the vulnerable system.
    VulnerableImpact {
        High => ("H", 0.0),
        Low => ("L", 0.1),
        None => ("N", 0.2),
    }
);

scoring_value!(
    /// Confidentiality impact on subsequent systems. Also the base value
    /// list of subsequent integrity and availability.
    SubsequentImpact {
        High => ("H", 0.1),
        Low => ("L", 0.2),
        None => ("N", 0.3),
    }
);

scoring_value!(
    /// Integrity or availability impact on subsequent systems, where the
    /// environmental override may raise it to safety.
    SafetyImpact {
        Safety => ("S", 0.0),
        High => ("H", 0.1),
        Low => ("L", 0.2),
        None => ("N", 0.3),
    }
);

scoring_value!(ExploitMaturity {
    Attacked => ("A", 0.0),
    ProofOfConcept => ("P", 0.1),
    Unreported => ("U", 0.2),
});

scoring_value!(
    /// Confidentiality, integrity or availability requirement.
    Requirement {
        High => ("H", 0.0),
        Medium => ("M", 0.1),
        Low => ("L", 0.2),
    }
);

/// Effective values of one selection, typed per metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoringVector {
    pub av: AttackVector,
    pub ac: AttackComplexity,
    pub at: AttackRequirements,
    pub pr: PrivilegesRequired,
    pub ui: UserInteraction,
    pub vc: VulnerableImpact,
    pub vi: VulnerableImpact,
    pub va: VulnerableImpact,
    pub sc: SubsequentImpact,
    pub si: SafetyImpact,
    pub sa: SafetyImpact,
    pub e: ExploitMaturity,
    pub cr: Requirement,
    pub ir: Requirement,
    pub ar: Requirement,
}

impl ScoringVector {
    /// Convert the effective values of `selection`.
    ///
    /// `None` only if the catalogue and the typed codes disagree.
    pub fn from_selection(selection: &CvssSelection) -> Option<Self> {
        let m = |metric: Metric| selection.effective(metric);
        Some(Self {
            av: AttackVector::from_code(m(Metric::AttackVector))?,
            ac: AttackComplexity::from_code(m(Metric::AttackComplexity))?,
            at: AttackRequirements::from_code(m(Metric::AttackRequirements))?,
            pr: PrivilegesRequired::from_code(m(Metric::PrivilegesRequired))?,
            ui: UserInteraction::from_code(m(Metric::UserInteraction))?,
            vc: VulnerableImpact::from_code(m(Metric::VulnConfidentiality))?,
            vi: VulnerableImpact::from_code(m(Metric::VulnIntegrity))?,
            va: VulnerableImpact::from_code(m(Metric::VulnAvailability))?,
            sc: SubsequentImpact::from_code(m(Metric::SubConfidentiality))?,
            si: SafetyImpact::from_code(m(Metric::SubIntegrity))?,
            sa: SafetyImpact::from_code(m(Metric::SubAvailability))?,
            e: ExploitMaturity::from_code(m(Metric::ExploitMaturity))?,
            cr: Requirement::from_code(m(Metric::ConfidentialityRequirement))?,
            ir: Requirement::from_code(m(Metric::IntegrityRequirement))?,
            ar: Requirement::from_code(m(Metric::AvailabilityRequirement))?,
        })
    }

    /// No impact on any system.
    pub fn has_no_impact(&self) -> bool {
        [self.vc, self.vi, self.va].iter().all(|impact| *impact == VulnerableImpact::None)
            && self.sc == SubsequentImpact::None
            && [self.si, self.sa].iter().all(|impact| *impact == SafetyImpact::None)
    }

    /// Per-metric severity levels in interpolation order: AV, PR, UI, AC,
    /// AT, VC, VI, VA, SC, SI, SA, CR, IR, AR. Exploit maturity has no
    /// intra-class distance and is left out.
    pub fn levels(&self) -> [f64; 14] {
        [
            self.av.level(),
            self.pr.level(),
            self.ui.level(),
            self.ac.level(),
            self.at.level(),
            self.vc.level(),
            self.vi.level(),
            self.va.level(),
            self.sc.level(),
            self.si.level(),
            self.sa.level(),
            self.cr.level(),
            self.ir.level(),
            self.ar.level(),
        ]
    }
}
