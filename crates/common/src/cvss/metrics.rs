// CVSS v4.0 metric catalogue.
//
// Every metric is a variant of `Metric`; its legal value codes are a closed
// set listed by `Metric::values`, taken from the typed scoring values for
// every metric that feeds the score. Canonical order is the order of
// `Metric::ALL`, which is also the serialization order of vector strings.

use std::fmt;

use super::values::{
    AttackComplexity, AttackRequirements, AttackVector, ExploitMaturity, PrivilegesRequired,
    Requirement, SafetyImpact, SubsequentImpact, UserInteraction, VulnerableImpact,
};

/// Value code meaning "not defined" for optional metrics.
pub const NOT_DEFINED: &str = "X";

/// Number of leading metrics in canonical order that every vector must carry.
pub const MANDATORY_METRIC_COUNT: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricGroup {
    Base,
    Threat,
    Environmental,
    Supplemental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    // Base: exploitability
    AttackVector,
    AttackComplexity,
    AttackRequirements,
    PrivilegesRequired,
    UserInteraction,
    // Base: impact
    VulnConfidentiality,
    VulnIntegrity,
    VulnAvailability,
    SubConfidentiality,
    SubIntegrity,
    SubAvailability,
    // Threat
    ExploitMaturity,
    // Environmental: security requirements
    ConfidentialityRequirement,
    IntegrityRequirement,
    AvailabilityRequirement,
    // Environmental: modified base metrics
    ModifiedAttackVector,
    ModifiedAttackComplexity,
    ModifiedAttackRequirements,
    ModifiedPrivilegesRequired,
    ModifiedUserInteraction,
    ModifiedVulnConfidentiality,
    ModifiedVulnIntegrity,
    ModifiedVulnAvailability,
    ModifiedSubConfidentiality,
    ModifiedSubIntegrity,
    ModifiedSubAvailability,
    // Supplemental
    Safety,
    Automatable,
    Recovery,
    ValueDensity,
    ResponseEffort,
    ProviderUrgency,
}

impl Metric {
    /// All metrics in canonical vector order.
    pub const ALL: [Metric; 32] = [
        Metric::AttackVector,
        Metric::AttackComplexity,
        Metric::AttackRequirements,
        Metric::PrivilegesRequired,
        Metric::UserInteraction,
        Metric::VulnConfidentiality,
        Metric::VulnIntegrity,
        Metric::VulnAvailability,
        Metric::SubConfidentiality,
        Metric::SubIntegrity,
        Metric::SubAvailability,
        Metric::ExploitMaturity,
        Metric::ConfidentialityRequirement,
        Metric::IntegrityRequirement,
        Metric::AvailabilityRequirement,
        Metric::ModifiedAttackVector,
        Metric::ModifiedAttackComplexity,
        Metric::ModifiedAttackRequirements,
        Metric::ModifiedPrivilegesRequired,
        Metric::ModifiedUserInteraction,
        Metric::ModifiedVulnConfidentiality,
        Metric::ModifiedVulnIntegrity,
        Metric::ModifiedVulnAvailability,
        Metric::ModifiedSubConfidentiality,
        Metric::ModifiedSubIntegrity,
        Metric::ModifiedSubAvailability,
        Metric::Safety,
        Metric::Automatable,
        Metric::Recovery,
        Metric::ValueDensity,
        Metric::ResponseEffort,
        Metric::ProviderUrgency,
    ];

    /// Position in canonical order (also the index into a selection).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short code used in vector strings, e.g. `"AV"` or `"MSI"`.
    pub const fn code(self) -> &'static str {
        match self {
            Self::AttackVector => "AV",
            Self::AttackComplexity => "AC",
            Self::AttackRequirements => "AT",
            Self::PrivilegesRequired => "PR",
            Self::UserInteraction => "UI",
            Self::VulnConfidentiality => "VC",
            Self::VulnIntegrity => "VI",
            Self::VulnAvailability => "VA",
            Self::SubConfidentiality => "SC",
            Self::SubIntegrity => "SI",
            Self::SubAvailability => "SA",
            Self::ExploitMaturity => "E",
            Self::ConfidentialityRequirement => "CR",
            Self::IntegrityRequirement => "IR",
            Self::AvailabilityRequirement => "AR",
            Self::ModifiedAttackVector => "MAV",
            Self::ModifiedAttackComplexity => "MAC",
            Self::ModifiedAttackRequirements => "MAT",
            Self::ModifiedPrivilegesRequired => "MPR",
            Self::ModifiedUserInteraction => "MUI",
            Self::ModifiedVulnConfidentiality => "MVC",
            Self::ModifiedVulnIntegrity => "MVI",
            Self::ModifiedVulnAvailability => "MVA",
            Self::ModifiedSubConfidentiality => "MSC",
            Self::ModifiedSubIntegrity => "MSI",
            Self::ModifiedSubAvailability => "MSA",
            Self::Safety => "S",
            Self::Automatable => "AU",
            Self::Recovery => "R",
            Self::ValueDensity => "V",
            Self::ResponseEffort => "RE",
            Self::ProviderUrgency => "U",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::AttackVector => "Attack Vector",
            Self::AttackComplexity => "Attack Complexity",
            Self::AttackRequirements => "Attack Requirements",
            Self::PrivilegesRequired => "Privileges Required",
            Self::UserInteraction => "User Interaction",
            Self::VulnConfidentiality => "Confidentiality (Vulnerable System)",
            Self::VulnIntegrity => "Integrity (Vulnerable System)",
            Self::VulnAvailability => "Availability (Vulnerable System)",
            Self::SubConfidentiality => "Confidentiality (Subsequent System)",
            Self::SubIntegrity => "Integrity (Subsequent System)",
            Self::SubAvailability => "Availability (Subsequent System)",
            Self::ExploitMaturity => "Exploit Maturity",
            Self::ConfidentialityRequirement => "Confidentiality Requirement",
            Self::IntegrityRequirement => "Integrity Requirement",
            Self::AvailabilityRequirement => "Availability Requirement",
            Self::ModifiedAttackVector => "Modified Attack Vector",
            Self::ModifiedAttackComplexity => "Modified Attack Complexity",
            Self::ModifiedAttackRequirements => "Modified Attack Requirements",
            Self::ModifiedPrivilegesRequired => "Modified Privileges Required",
            Self::ModifiedUserInteraction => "Modified User Interaction",
            Self::ModifiedVulnConfidentiality => "Modified Confidentiality (Vulnerable System)",
            Self::ModifiedVulnIntegrity => "Modified Integrity (Vulnerable System)",
            Self::ModifiedVulnAvailability => "Modified Availability (Vulnerable System)",
            Self::ModifiedSubConfidentiality => "Modified Confidentiality (Subsequent System)",
            Self::ModifiedSubIntegrity => "Modified Integrity (Subsequent System)",
            Self::ModifiedSubAvailability => "Modified Availability (Subsequent System)",
            Self::Safety => "Safety",
            Self::Automatable => "Automatable",
            Self::Recovery => "Recovery",
            Self::ValueDensity => "Value Density",
            Self::ResponseEffort => "Vulnerability Response Effort",
            Self::ProviderUrgency => "Provider Urgency",
        }
    }

    pub const fn group(self) -> MetricGroup {
        match self {
            Self::AttackVector
            | Self::AttackComplexity
            | Self::AttackRequirements
            | Self::PrivilegesRequired
            | Self::UserInteraction
            | Self::VulnConfidentiality
            | Self::VulnIntegrity
            | Self::VulnAvailability
            | Self::SubConfidentiality
            | Self::SubIntegrity
            | Self::SubAvailability => MetricGroup::Base,
            Self::ExploitMaturity => MetricGroup::Threat,
            Self::Safety
            | Self::Automatable
            | Self::Recovery
            | Self::ValueDensity
            | Self::ResponseEffort
            | Self::ProviderUrgency => MetricGroup::Supplemental,
            _ => MetricGroup::Environmental,
        }
    }

    /// Legal value codes; the first entry is the schema default.
    pub const fn values(self) -> &'static [&'static str] {
        match self {
            Self::AttackVector => AttackVector::CODES,
            Self::AttackComplexity => AttackComplexity::CODES,
            Self::AttackRequirements => AttackRequirements::CODES,
            Self::PrivilegesRequired => PrivilegesRequired::CODES,
            Self::UserInteraction => UserInteraction::CODES,
            Self::VulnConfidentiality | Self::VulnIntegrity | Self::VulnAvailability => {
                VulnerableImpact::CODES
            }
            Self::SubConfidentiality | Self::SubIntegrity | Self::SubAvailability => {
                SubsequentImpact::CODES
            }
            Self::ExploitMaturity => ExploitMaturity::OPTIONAL_CODES,
            Self::ConfidentialityRequirement
            | Self::IntegrityRequirement
            | Self::AvailabilityRequirement => Requirement::OPTIONAL_CODES,
            Self::ModifiedAttackVector => AttackVector::OPTIONAL_CODES,
            Self::ModifiedAttackComplexity => AttackComplexity::OPTIONAL_CODES,
            Self::ModifiedAttackRequirements => AttackRequirements::OPTIONAL_CODES,
            Self::ModifiedPrivilegesRequired => PrivilegesRequired::OPTIONAL_CODES,
            Self::ModifiedUserInteraction => UserInteraction::OPTIONAL_CODES,
            Self::ModifiedVulnConfidentiality
            | Self::ModifiedVulnIntegrity
            | Self::ModifiedVulnAvailability => VulnerableImpact::OPTIONAL_CODES,
            Self::ModifiedSubConfidentiality => SubsequentImpact::OPTIONAL_CODES,
            Self::ModifiedSubIntegrity | Self::ModifiedSubAvailability => {
                SafetyImpact::OPTIONAL_CODES
            }
            Self::Safety => &["X", "N", "P"],
            Self::Automatable => &["X", "N", "Y"],
            Self::Recovery => &["X", "A", "U", "I"],
            Self::ValueDensity => &["X", "D", "C"],
            Self::ResponseEffort => &["X", "L", "M", "H"],
            Self::ProviderUrgency => &["X", "Clear", "Green", "Amber", "Red"],
        }
    }

    pub fn default_value(self) -> &'static str {
        self.values()[0]
    }

    /// Base metrics must appear in every vector.
    pub fn is_mandatory(self) -> bool {
        self.index() < MANDATORY_METRIC_COUNT
    }

    /// The environmental override of a base metric, if any.
    pub const fn modified(self) -> Option<Metric> {
        match self {
            Self::AttackVector => Some(Self::ModifiedAttackVector),
            Self::AttackComplexity => Some(Self::ModifiedAttackComplexity),
            Self::AttackRequirements => Some(Self::ModifiedAttackRequirements),
            Self::PrivilegesRequired => Some(Self::ModifiedPrivilegesRequired),
            Self::UserInteraction => Some(Self::ModifiedUserInteraction),
            Self::VulnConfidentiality => Some(Self::ModifiedVulnConfidentiality),
            Self::VulnIntegrity => Some(Self::ModifiedVulnIntegrity),
            Self::VulnAvailability => Some(Self::ModifiedVulnAvailability),
            Self::SubConfidentiality => Some(Self::ModifiedSubConfidentiality),
            Self::SubIntegrity => Some(Self::ModifiedSubIntegrity),
            Self::SubAvailability => Some(Self::ModifiedSubAvailability),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Metric> {
        Self::ALL.into_iter().find(|metric| metric.code() == code)
    }

    /// Intern a value code into the catalogue's static string, if legal.
    pub fn legal_value(self, value: &str) -> Option<&'static str> {
        self.values().iter().copied().find(|candidate| *candidate == value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
