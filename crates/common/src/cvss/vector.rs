// CVSS v4.0 vector string parsing and canonical serialization.

use thiserror::Error;

use super::metrics::{Metric, NOT_DEFINED};

pub const VECTOR_PREFIX: &str = "CVSS:4.0";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CvssParseError {
    #[error("vector must start with `{VECTOR_PREFIX}`")]
    MissingPrefix,
    #[error("malformed vector component `{0}`")]
    MalformedComponent(String),
    #[error("mandatory metric {0} is missing")]
    MissingMandatory(Metric),
    #[error("metric `{0}` is unknown, duplicated, or out of canonical order")]
    OutOfOrder(String),
    #[error("`{value}` is not a legal value for metric {metric}")]
    InvalidValue { metric: Metric, value: String },
}

/// Parse a vector string into `(metric, value)` pairs in canonical order.
///
/// Metrics may be skipped unless mandatory; every metric that appears must
/// come after the previous one in canonical order and carry a legal value.
pub fn parse_vector(vector: &str) -> Result<Vec<(Metric, &'static str)>, CvssParseError> {
    let rest = vector.trim().strip_prefix(VECTOR_PREFIX).ok_or(CvssParseError::MissingPrefix)?;
    if rest.is_empty() {
        return Err(CvssParseError::MissingMandatory(Metric::ALL[0]));
    }
    let rest = rest.strip_prefix('/').ok_or(CvssParseError::MissingPrefix)?;

    let mut parsed = Vec::new();
    let mut cursor = 0usize;
    for component in rest.split('/') {
        let (code, value) = component
            .split_once(':')
            .filter(|(code, value)| !code.is_empty() && !value.is_empty())
            .ok_or_else(|| CvssParseError::MalformedComponent(component.to_string()))?;

        let metric = loop {
            let Some(candidate) = Metric::ALL.get(cursor).copied() else {
                return Err(CvssParseError::OutOfOrder(code.to_string()));
            };
            cursor += 1;
            if candidate.code() == code {
                break candidate;
            }
            if candidate.is_mandatory() {
                // A later metric (or an unknown code) appeared before this one.
                return Err(if Metric::from_code(code).is_some() {
                    CvssParseError::MissingMandatory(candidate)
                } else {
                    CvssParseError::OutOfOrder(code.to_string())
                });
            }
        };

        let value = metric.legal_value(value).ok_or_else(|| CvssParseError::InvalidValue {
            metric,
            value: value.to_string(),
        })?;
        parsed.push((metric, value));
    }

    // Mandatory metrics skipped mid-vector were rejected above; only a
    // truncated tail remains to check.
    if let Some(missing) = Metric::ALL.into_iter().skip(cursor).find(|metric| metric.is_mandatory())
    {
        return Err(CvssParseError::MissingMandatory(missing));
    }

    Ok(parsed)
}

/// Serialize `(metric, value)` pairs canonically, omitting not-defined values.
pub fn format_vector<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = (Metric, &'a str)>,
{
    let mut ordered: Vec<(Metric, &str)> = values.into_iter().collect();
    ordered.sort_by_key(|(metric, _)| *metric);

    let mut vector = String::from(VECTOR_PREFIX);
    for (metric, value) in ordered {
        if value == NOT_DEFINED {
            continue;
        }
        vector.push('/');
        vector.push_str(metric.code());
        vector.push(':');
        vector.push_str(value);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N";

    #[test]
    fn parses_base_vector_in_order() {
        let parsed = parse_vector(BASE).expect("base vector should parse");
        assert_eq!(parsed.len(), 11);
        assert_eq!(parsed[0], (Metric::AttackVector, "N"));
        assert_eq!(parsed[10], (Metric::SubAvailability, "N"));
    }

    #[test]
    fn optional_metrics_may_be_skipped() {
        let parsed = parse_vector(&format!("{BASE}/CR:L/MAV:P/U:Amber")).expect("should parse");
        assert_eq!(parsed.len(), 14);
        assert_eq!(parsed[13], (Metric::ProviderUrgency, "Amber"));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert_eq!(
            parse_vector("AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N"),
            Err(CvssParseError::MissingPrefix)
        );
        assert_eq!(
            parse_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"),
            Err(CvssParseError::MissingPrefix)
        );
    }

    #[test]
    fn rejects_missing_mandatory_metric() {
        let without_ui = "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N";
        assert_eq!(
            parse_vector(without_ui),
            Err(CvssParseError::MissingMandatory(Metric::UserInteraction))
        );

        let truncated = "CVSS:4.0/AV:N/AC:L/AT:N";
        assert_eq!(
            parse_vector(truncated),
            Err(CvssParseError::MissingMandatory(Metric::PrivilegesRequired))
        );

        assert_eq!(
            parse_vector("CVSS:4.0"),
            Err(CvssParseError::MissingMandatory(Metric::AttackVector))
        );
    }

    #[test]
    fn rejects_out_of_order_optional_metrics() {
        let swapped = format!("{BASE}/MAV:N/CR:H");
        assert_eq!(parse_vector(&swapped), Err(CvssParseError::OutOfOrder("CR".to_string())));
    }

    #[test]
    fn rejects_duplicate_metric() {
        let duplicated = format!("{BASE}/E:A/E:P");
        assert_eq!(parse_vector(&duplicated), Err(CvssParseError::OutOfOrder("E".to_string())));
    }

    #[test]
    fn rejects_unknown_metric() {
        let unknown = format!("{BASE}/ZZ:A");
        assert_eq!(parse_vector(&unknown), Err(CvssParseError::OutOfOrder("ZZ".to_string())));
    }

    #[test]
    fn rejects_illegal_value() {
        let bad = "CVSS:4.0/AV:X/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N";
        assert_eq!(
            parse_vector(bad),
            Err(CvssParseError::InvalidValue {
                metric: Metric::AttackVector,
                value: "X".to_string()
            })
        );
        assert!(matches!(
            parse_vector(&format!("{BASE}/SI:S")),
            Err(CvssParseError::OutOfOrder(_))
        ));
        assert!(matches!(
            parse_vector("CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:S/SA:N"),
            Err(CvssParseError::InvalidValue { metric: Metric::SubIntegrity, .. })
        ));
    }

    #[test]
    fn rejects_malformed_components() {
        assert!(matches!(
            parse_vector(&format!("{BASE}/E")),
            Err(CvssParseError::MalformedComponent(_))
        ));
        assert!(matches!(
            parse_vector(&format!("{BASE}/")),
            Err(CvssParseError::MalformedComponent(_))
        ));
    }

    #[test]
    fn format_emits_canonical_order_and_skips_not_defined() {
        let formatted = format_vector([
            (Metric::ExploitMaturity, "X"),
            (Metric::AttackComplexity, "L"),
            (Metric::AttackVector, "N"),
            (Metric::ConfidentialityRequirement, "H"),
        ]);
        assert_eq!(formatted, "CVSS:4.0/AV:N/AC:L/CR:H");
    }
}
