// Acronym expansion map: bundled table merged with administrator-managed
// overrides.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One expansion of an acronym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Expansion {
    pub fn new(text: impl Into<String>, category: Option<&str>) -> Self {
        Self { text: text.into(), category: category.map(str::to_string) }
    }
}

/// Record of the remote acronym table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicAcronym {
    pub acronym: String,
    pub expansion: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub override_builtin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_active() -> bool {
    true
}

const BUILTIN: &[(&str, &str, Option<&str>)] = &[
    ("ACL", "Access Control List", Some("access")),
    ("AES", "Advanced Encryption Standard", Some("crypto")),
    ("API", "Application Programming Interface", None),
    ("APT", "Advanced Persistent Threat", Some("threat")),
    ("ASLR", "Address Space Layout Randomization", Some("mitigation")),
    ("CIA", "Confidentiality, Integrity, Availability", Some("principle")),
    ("CORS", "Cross-Origin Resource Sharing", Some("web")),
    ("CSP", "Content Security Policy", Some("web")),
    ("CSP", "Cloud Service Provider", None),
    ("CSRF", "Cross-Site Request Forgery", Some("web")),
    ("CVE", "Common Vulnerabilities and Exposures", Some("vulnerability")),
    ("CVSS", "Common Vulnerability Scoring System", Some("vulnerability")),
    ("CWE", "Common Weakness Enumeration", Some("vulnerability")),
    ("DAST", "Dynamic Application Security Testing", Some("testing")),
    ("DDoS", "Distributed Denial of Service", Some("threat")),
    ("DEP", "Data Execution Prevention", Some("mitigation")),
    ("DNS", "Domain Name System", Some("network")),
    ("DoS", "Denial of Service", Some("threat")),
    ("EDR", "Endpoint Detection and Response", Some("defense")),
    ("HSTS", "HTTP Strict Transport Security", Some("web")),
    ("IDOR", "Insecure Direct Object Reference", Some("web")),
    ("IDS", "Intrusion Detection System", Some("defense")),
    ("JWT", "JSON Web Token", Some("access")),
    ("LFI", "Local File Inclusion", Some("web")),
    ("MFA", "Multi-Factor Authentication", Some("access")),
    ("MITM", "Man-in-the-Middle", Some("threat")),
    ("OWASP", "Open Worldwide Application Security Project", None),
    ("PII", "Personally Identifiable Information", Some("data")),
    ("RCE", "Remote Code Execution", Some("threat")),
    ("RFI", "Remote File Inclusion", Some("web")),
    ("SAST", "Static Application Security Testing", Some("testing")),
    ("SIEM", "Security Information and Event Management", Some("defense")),
    ("SQLi", "SQL Injection", Some("web")),
    ("SSO", "Single Sign-On", Some("access")),
    ("SSRF", "Server-Side Request Forgery", Some("web")),
    ("TLS", "Transport Layer Security", Some("crypto")),
    ("TTP", "Tactics, Techniques, and Procedures", Some("threat")),
    ("WAF", "Web Application Firewall", Some("defense")),
    ("XSS", "Cross-Site Scripting", Some("web")),
    ("XXE", "XML External Entity", Some("web")),
];

/// Case-insensitive mapping from acronym to expansions in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcronymMap {
    entries: HashMap<String, Vec<Expansion>>,
}

impl AcronymMap {
    /// The bundled table on its own.
    pub fn builtin() -> Self {
        let mut map = Self::default();
        for (acronym, text, category) in BUILTIN {
            map.entries.entry(normalize(acronym)).or_default().push(Expansion::new(*text, *category));
        }
        map
    }

    /// Merge active dynamic records into the bundled table.
    ///
    /// Records are applied in descending priority. For each acronym the
    /// dynamic expansions come first; bundled expansions are kept after them
    /// unless one of the records sets `override_builtin`.
    pub fn merged(dynamic: &[DynamicAcronym]) -> Self {
        Self::builtin().merge(dynamic)
    }

    pub fn merge(mut self, dynamic: &[DynamicAcronym]) -> Self {
        let mut active: Vec<&DynamicAcronym> =
            dynamic.iter().filter(|record| record.is_active).collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut grouped: Vec<(String, Vec<&DynamicAcronym>)> = Vec::new();
        for record in active {
            let key = normalize(&record.acronym);
            match grouped.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, records)) => records.push(record),
                None => grouped.push((key, vec![record])),
            }
        }

        for (key, records) in grouped {
            let overrides = records.iter().any(|record| record.override_builtin);
            let mut expansions: Vec<Expansion> = records
                .iter()
                .map(|record| Expansion::new(record.expansion.clone(), record.category.as_deref()))
                .collect();

            if !overrides {
                let existing = self.entries.remove(&key).unwrap_or_default();
                for expansion in existing {
                    if !expansions.iter().any(|e| e.text.eq_ignore_ascii_case(&expansion.text)) {
                        expansions.push(expansion);
                    }
                }
            }
            self.entries.insert(key, expansions);
        }
        self
    }

    /// Expansions for `acronym`, highest priority first.
    pub fn lookup(&self, acronym: &str) -> &[Expansion] {
        self.entries.get(&normalize(acronym)).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, acronym: &str) -> bool {
        self.entries.contains_key(&normalize(acronym))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Acronyms in lowercase, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

fn normalize(acronym: &str) -> String {
    acronym.trim().to_lowercase()
}
