// Metric selection state: one value per catalogue metric.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::metrics::{Metric, NOT_DEFINED};
use super::score::{self, MacroVector, Severity};
use super::values::ScoringVector;
use super::vector::{format_vector, parse_vector, CvssParseError};

/// Selected value for every metric in the catalogue.
///
/// Values are always legal for their metric: construction starts from the
/// catalogue defaults and every mutation path validates first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CvssSelection {
    values: [&'static str; 32],
}

impl CvssSelection {
    pub fn new() -> Self {
        Self { values: Metric::ALL.map(Metric::default_value) }
    }

    /// Build a selection from a vector string, starting from defaults.
    pub fn from_vector(vector: &str) -> Result<Self, CvssParseError> {
        let mut selection = Self::new();
        selection.apply_vector(vector)?;
        Ok(selection)
    }

    pub fn get(&self, metric: Metric) -> &'static str {
        self.values[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: &str) -> Result<(), CvssParseError> {
        let value = metric.legal_value(value).ok_or_else(|| CvssParseError::InvalidValue {
            metric,
            value: value.to_string(),
        })?;
        self.values[metric.index()] = value;
        Ok(())
    }

    /// Replace the selection with the metrics of `vector`.
    ///
    /// Metrics absent from the vector reset to their defaults. On any parse
    /// failure the selection is left untouched.
    pub fn apply_vector(&mut self, vector: &str) -> Result<(), CvssParseError> {
        let parsed = match parse_vector(vector) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(vector, error = %err, "rejected CVSS vector");
                return Err(err);
            }
        };

        let mut values = Metric::ALL.map(Metric::default_value);
        for (metric, value) in parsed {
            values[metric.index()] = value;
        }
        self.values = values;
        Ok(())
    }

    /// Value used for scoring after environmental overrides and worst-case
    /// defaults for threat and requirement metrics.
    pub fn effective(&self, metric: Metric) -> &'static str {
        let selected = self.get(metric);
        match metric {
            Metric::ExploitMaturity if selected == NOT_DEFINED => "A",
            Metric::ConfidentialityRequirement
            | Metric::IntegrityRequirement
            | Metric::AvailabilityRequirement
                if selected == NOT_DEFINED =>
            {
                "H"
            }
            _ => match metric.modified().map(|modified| self.get(modified)) {
                Some(overridden) if overridden != NOT_DEFINED => overridden,
                _ => selected,
            },
        }
    }

    /// Canonical vector string; not-defined metrics are omitted.
    pub fn vector(&self) -> String {
        format_vector(self.iter())
    }

    pub fn score(&self) -> f64 {
        score::score(self)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_score(self.score())
    }

    /// Effective values typed per scoring metric.
    pub fn scoring_values(&self) -> Option<ScoringVector> {
        ScoringVector::from_selection(self)
    }

    pub fn macro_vector(&self) -> Option<MacroVector> {
        self.scoring_values().map(|values| MacroVector::classify(&values))
    }

    /// `(metric, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, &'static str)> + '_ {
        Metric::ALL.into_iter().map(|metric| (metric, self.get(metric)))
    }
}

impl Default for CvssSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CvssSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CvssSelection").field(&self.vector()).finish()
    }
}

impl Serialize for CvssSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Metric::ALL.len()))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.code(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CvssSelection {
    /// Accepts a partial map; metrics left out keep their defaults.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut selection = Self::new();
        for (code, value) in raw {
            let metric = Metric::from_code(&code)
                .ok_or_else(|| de::Error::custom(format!("unknown CVSS metric `{code}`")))?;
            selection.set(metric, &value).map_err(de::Error::custom)?;
        }
        Ok(selection)
    }
}

/// Everything a report needs to display for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssScore {
    pub score: f64,
    pub severity: Severity,
    pub macro_vector: String,
    pub vector: String,
}

impl From<&CvssSelection> for CvssScore {
    fn from(selection: &CvssSelection) -> Self {
        let score = selection.score();
        Self {
            score,
            severity: Severity::from_score(score),
            macro_vector: selection.macro_vector().map(|mv| mv.key()).unwrap_or_default(),
            vector: selection.vector(),
        }
    }
}
