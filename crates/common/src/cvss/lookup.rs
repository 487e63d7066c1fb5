// CVSS v4.0 reference tables.
//
// Macro-vector scores, highest-severity vectors per equivalence class, and
// maximal class depths as published with the CVSS v4.0 specification.

use super::values::{
    AttackComplexity, AttackRequirements, AttackVector, ExploitMaturity, PrivilegesRequired,
    Requirement, SafetyImpact, SubsequentImpact, UserInteraction, VulnerableImpact,
};

/// Score for each of the 270 valid macro-vectors, sorted by key.
const MACRO_VECTOR_SCORES: [(&str, f64); 270] = [
    ("000000", 10.0), ("000001", 9.9), ("000010", 9.8), ("000011", 9.5),
    ("000020", 9.5), ("000021", 9.2), ("000100", 10.0), ("000101", 9.6),
    ("000110", 9.3), ("000111", 8.7), ("000120", 9.1), ("000121", 8.1),
    ("000200", 9.3), ("000201", 9.0), ("000210", 8.9), ("000211", 8.0),
    ("000220", 8.1), ("000221", 6.8), ("001000", 9.8), ("001001", 9.5),
    ("001010", 9.5), ("001011", 9.2), ("001020", 9.0), ("001021", 8.4),
    ("001100", 9.3), ("001101", 9.2), ("001110", 8.9), ("001111", 8.1),
    ("001120", 8.1), ("001121", 6.5), ("001200", 8.8), ("001201", 8.0),
    ("001210", 7.8), ("001211", 7.0), ("001220", 6.9), ("001221", 4.8),
    ("002001", 9.2), ("002011", 8.2), ("002021", 7.2), ("002101", 7.9),
    ("002111", 6.9), ("002121", 5.0), ("002201", 6.9), ("002211", 5.5),
    ("002221", 2.7), ("010000", 9.9), ("010001", 9.7), ("010010", 9.5),
    ("010011", 9.2), ("010020", 9.2), ("010021", 8.5), ("010100", 9.5),
    ("010101", 9.1), ("010110", 9.0), ("010111", 8.3), ("010120", 8.4),
    ("010121", 7.1), ("010200", 9.2), ("010201", 8.1), ("010210", 8.2),
    ("010211", 7.1), ("010220", 7.2), ("010221", 5.3), ("011000", 9.5),
    ("011001", 9.3), ("011010", 9.2), ("011011", 8.5), ("011020", 8.5),
    ("011021", 7.3), ("011100", 9.2), ("011101", 8.2), ("011110", 8.0),
    ("011111", 7.2), ("011120", 7.0), ("011121", 5.9), ("011200", 8.4),
    ("011201", 7.0), ("011210", 7.1), ("011211", 5.2), ("011220", 5.0),
    ("011221", 3.0), ("012001", 8.6), ("012011", 7.5), ("012021", 5.2),
    ("012101", 7.1), ("012111", 5.2), ("012121", 2.9), ("012201", 6.3),
    ("012211", 2.9), ("012221", 1.7), ("100000", 9.8), ("100001", 9.5),
    ("100010", 9.4), ("100011", 8.7), ("100020", 9.1), ("100021", 8.1),
    ("100100", 9.4), ("100101", 8.9), ("100110", 8.6), ("100111", 7.4),
    ("100120", 7.7), ("100121", 6.4), ("100200", 8.7), ("100201", 7.5),
    ("100210", 7.4), ("100211", 6.3), ("100220", 6.3), ("100221", 4.9),
    ("101000", 9.4), ("101001", 8.9), ("101010", 8.8), ("101011", 7.7),
    ("101020", 7.6), ("101021", 6.7), ("101100", 8.6), ("101101", 7.6),
    ("101110", 7.4), ("101111", 5.8), ("101120", 5.9), ("101121", 5.0),
    ("101200", 7.2), ("101201", 5.7), ("101210", 5.7), ("101211", 5.2),
    ("101220", 5.2), ("101221", 2.5), ("102001", 8.3), ("102011", 7.0),
    ("102021", 5.4), ("102101", 6.5), ("102111", 5.8), ("102121", 2.6),
    ("102201", 5.3), ("102211", 2.1), ("102221", 1.3), ("110000", 9.5),
    ("110001", 9.0), ("110010", 8.8), ("110011", 7.6), ("110020", 7.6),
    ("110021", 7.0), ("110100", 9.0), ("110101", 7.7), ("110110", 7.5),
    ("110111", 6.2), ("110120", 6.1), ("110121", 5.3), ("110200", 7.7),
    ("110201", 6.6), ("110210", 6.8), ("110211", 5.9), ("110220", 5.2),
    ("110221", 3.0), ("111000", 8.9), ("111001", 7.8), ("111010", 7.6),
    ("111011", 6.7), ("111020", 6.2), ("111021", 5.8), ("111100", 7.4),
    ("111101", 5.9), ("111110", 5.7), ("111111", 5.7), ("111120", 4.7),
    ("111121", 2.3), ("111200", 6.1), ("111201", 5.2), ("111210", 5.7),
    ("111211", 2.9), ("111220", 2.4), ("111221", 1.6), ("112001", 7.1),
    ("112011", 5.9), ("112021", 3.0), ("112101", 5.8), ("112111", 2.6),
    ("112121", 1.5), ("112201", 2.3), ("112211", 1.3), ("112221", 0.6),
    ("200000", 9.3), ("200001", 8.7), ("200010", 8.6), ("200011", 7.2),
    ("200020", 7.5), ("200021", 5.8), ("200100", 8.6), ("200101", 7.4),
    ("200110", 7.4), ("200111", 6.1), ("200120", 5.6), ("200121", 3.4),
    ("200200", 7.0), ("200201", 5.4), ("200210", 5.2), ("200211", 4.0),
    ("200220", 4.0), ("200221", 2.2), ("201000", 8.5), ("201001", 7.5),
    ("201010", 7.4), ("201011", 5.5), ("201020", 6.2), ("201021", 5.1),
    ("201100", 7.2), ("201101", 5.7), ("201110", 5.5), ("201111", 4.1),
    ("201120", 4.6), ("201121", 1.9), ("201200", 5.3), ("201201", 3.6),
    ("201210", 3.4), ("201211", 1.9), ("201220", 1.9), ("201221", 0.8),
    ("202001", 6.4), ("202011", 5.1), ("202021", 2.0), ("202101", 4.7),
    ("202111", 2.1), ("202121", 1.1), ("202201", 2.4), ("202211", 0.9),
    ("202221", 0.4), ("210000", 8.8), ("210001", 7.5), ("210010", 7.3),
    ("210011", 5.3), ("210020", 6.0), ("210021", 5.0), ("210100", 7.3),
    ("210101", 5.5), ("210110", 5.9), ("210111", 4.0), ("210120", 4.1),
    ("210121", 2.0), ("210200", 5.4), ("210201", 4.3), ("210210", 4.5),
    ("210211", 2.2), ("210220", 2.0), ("210221", 1.1), ("211000", 7.5),
    ("211001", 5.5), ("211010", 5.8), ("211011", 4.5), ("211020", 4.0),
    ("211021", 2.1), ("211100", 6.1), ("211101", 5.1), ("211110", 4.8),
    ("211111", 1.8), ("211120", 2.0), ("211121", 0.9), ("211200", 4.6),
    ("211201", 1.8), ("211210", 1.7), ("211211", 0.7), ("211220", 0.8),
    ("211221", 0.2), ("212001", 5.3), ("212011", 2.4), ("212021", 1.4),
    ("212101", 2.4), ("212111", 1.2), ("212121", 0.5), ("212201", 1.0),
    ("212211", 0.3), ("212221", 0.1),
];

/// Look up the score of a six-digit macro-vector key.
///
/// Returns `None` for keys outside the table; callers treat that as "no
/// neighbouring macro-vector exists".
pub fn macro_vector_score(key: &str) -> Option<f64> {
    MACRO_VECTOR_SCORES
        .binary_search_by(|(candidate, _)| (*candidate).cmp(key))
        .ok()
        .map(|index| MACRO_VECTOR_SCORES[index].1)
}

/// Highest-severity AV, PR and UI of an EQ1 class.
pub type Eq1Max = (AttackVector, PrivilegesRequired, UserInteraction);

/// Highest-severity AC and AT of an EQ2 class.
pub type Eq2Max = (AttackComplexity, AttackRequirements);

/// Highest-severity VC, VI, VA, CR, IR and AR of a joint EQ3/EQ6 class.
pub type Eq3Eq6Max =
    (VulnerableImpact, VulnerableImpact, VulnerableImpact, Requirement, Requirement, Requirement);

/// Highest-severity SC, SI and SA of an EQ4 class.
pub type Eq4Max = (SubsequentImpact, SafetyImpact, SafetyImpact);

use AttackComplexity as Ac;
use AttackRequirements as At;
use AttackVector as Av;
use PrivilegesRequired as Pr;
use Requirement as Req;
use SafetyImpact as Safety;
use SubsequentImpact as Sub;
use UserInteraction as Ui;
use VulnerableImpact as Vuln;

const EQ1_MAXES: [&[Eq1Max]; 3] = [
    &[(Av::Network, Pr::None, Ui::None)],
    &[
        (Av::Adjacent, Pr::None, Ui::None),
        (Av::Network, Pr::Low, Ui::None),
        (Av::Network, Pr::None, Ui::Passive),
    ],
    &[(Av::Physical, Pr::None, Ui::None), (Av::Adjacent, Pr::Low, Ui::Passive)],
];

const EQ2_MAXES: [&[Eq2Max]; 2] =
    [&[(Ac::Low, At::None)], &[(Ac::High, At::None), (Ac::Low, At::Present)]];

// Indexed by [eq3][eq6]; (2, 0) is not a valid combination.
const EQ3_EQ6_MAXES: [[&[Eq3Eq6Max]; 2]; 3] = [
    [
        &[(Vuln::High, Vuln::High, Vuln::High, Req::High, Req::High, Req::High)],
        &[
            (Vuln::High, Vuln::High, Vuln::Low, Req::Medium, Req::Medium, Req::High),
            (Vuln::High, Vuln::High, Vuln::High, Req::Medium, Req::Medium, Req::Medium),
        ],
    ],
    [
        &[
            (Vuln::Low, Vuln::High, Vuln::High, Req::High, Req::High, Req::High),
            (Vuln::High, Vuln::Low, Vuln::High, Req::High, Req::High, Req::High),
        ],
        &[
            (Vuln::Low, Vuln::High, Vuln::Low, Req::High, Req::Medium, Req::High),
            (Vuln::Low, Vuln::High, Vuln::High, Req::High, Req::Medium, Req::Medium),
            (Vuln::High, Vuln::Low, Vuln::High, Req::Medium, Req::High, Req::Medium),
            (Vuln::High, Vuln::Low, Vuln::Low, Req::Medium, Req::High, Req::High),
            (Vuln::Low, Vuln::Low, Vuln::High, Req::High, Req::High, Req::Medium),
        ],
    ],
    [&[], &[(Vuln::Low, Vuln::Low, Vuln::Low, Req::High, Req::High, Req::High)]],
];

const EQ4_MAXES: [&[Eq4Max]; 3] = [
    &[(Sub::High, Safety::Safety, Safety::Safety)],
    &[(Sub::High, Safety::High, Safety::High)],
    &[(Sub::Low, Safety::Low, Safety::Low)],
];

const EQ5_MAXES: [&[ExploitMaturity]; 3] = [
    &[ExploitMaturity::Attacked],
    &[ExploitMaturity::ProofOfConcept],
    &[ExploitMaturity::Unreported],
];

pub fn eq1_maxes(eq1: u8) -> &'static [Eq1Max] {
    EQ1_MAXES.get(usize::from(eq1)).copied().unwrap_or(&[])
}

pub fn eq2_maxes(eq2: u8) -> &'static [Eq2Max] {
    EQ2_MAXES.get(usize::from(eq2)).copied().unwrap_or(&[])
}

pub fn eq3_eq6_maxes(eq3: u8, eq6: u8) -> &'static [Eq3Eq6Max] {
    EQ3_EQ6_MAXES
        .get(usize::from(eq3))
        .and_then(|row| row.get(usize::from(eq6)))
        .copied()
        .unwrap_or(&[])
}

pub fn eq4_maxes(eq4: u8) -> &'static [Eq4Max] {
    EQ4_MAXES.get(usize::from(eq4)).copied().unwrap_or(&[])
}

pub fn eq5_maxes(eq5: u8) -> &'static [ExploitMaturity] {
    EQ5_MAXES.get(usize::from(eq5)).copied().unwrap_or(&[])
}

/// Maximal severity depth of each class, in tenths.
pub fn eq1_max_depth(eq1: u8) -> Option<u8> {
    [1, 4, 5].get(usize::from(eq1)).copied()
}

pub fn eq2_max_depth(eq2: u8) -> Option<u8> {
    [1, 2].get(usize::from(eq2)).copied()
}

pub fn eq3_eq6_max_depth(eq3: u8, eq6: u8) -> Option<u8> {
    match (eq3, eq6) {
        (0, 0) => Some(7),
        (0, 1) => Some(6),
        (1, 0) | (1, 1) => Some(8),
        (2, 1) => Some(10),
        _ => None,
    }
}

pub fn eq4_max_depth(eq4: u8) -> Option<u8> {
    [6, 5, 4].get(usize::from(eq4)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_valid_macro_vector() {
        let mut count = 0;
        for eq1 in 0..3 {
            for eq2 in 0..2 {
                for eq3 in 0..3 {
                    for eq4 in 0..3 {
                        for eq5 in 0..3 {
                            for eq6 in 0..2 {
                                let key = format!("{eq1}{eq2}{eq3}{eq4}{eq5}{eq6}");
                                let found = macro_vector_score(&key);
                                if eq3 == 2 && eq6 == 0 {
                                    assert!(found.is_none(), "{key} should not exist");
                                } else {
                                    assert!(found.is_some(), "{key} missing");
                                    count += 1;
                                }
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(count, MACRO_VECTOR_SCORES.len());
    }

    #[test]
    fn table_is_sorted_for_binary_search() {
        assert!(MACRO_VECTOR_SCORES.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn scores_stay_within_range() {
        assert!(MACRO_VECTOR_SCORES.iter().all(|(_, score)| (0.0..=10.0).contains(score)));
    }

    #[test]
    fn out_of_table_keys_are_absent() {
        assert_eq!(macro_vector_score("300000"), None);
        assert_eq!(macro_vector_score("000300"), None);
        assert_eq!(macro_vector_score(""), None);
    }

    #[test]
    fn every_class_has_max_vectors_where_defined() {
        for eq in 0..3 {
            assert!(!eq1_maxes(eq).is_empty());
            assert!(!eq4_maxes(eq).is_empty());
            assert!(!eq5_maxes(eq).is_empty());
        }
        assert!(eq3_eq6_maxes(2, 0).is_empty());
        assert_eq!(eq3_eq6_maxes(1, 1).len(), 5);
        assert_eq!(eq3_eq6_max_depth(2, 0), None);
    }
}
