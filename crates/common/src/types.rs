// Core identity and credential types shared across coreport crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel prefix for the lightweight project tree notifier.
pub const PROJECT_TREE_CHANNEL_PREFIX: &str = "project_tree_sync";

/// Identity of one collaboratively edited object.
///
/// Immutable for the lifetime of a session; composes the synchronization
/// channel name `"{model}/{object_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentIdentity {
    model: String,
    object_id: String,
}

impl DocumentIdentity {
    pub fn new(model: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self { model: model.into(), object_id: object_id.into() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Synchronization channel name for this document.
    pub fn channel_name(&self) -> String {
        format!("{}/{}", self.model, self.object_id)
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.object_id)
    }
}

/// Channel name for the tree-change notifier of one project.
pub fn project_tree_channel(project_id: &str) -> String {
    format!("{PROJECT_TREE_CHANNEL_PREFIX}/{project_id}")
}

/// Credential presented to the synchronization service on every connection
/// attempt.
///
/// Serialized as `"{token}"` or `"{token} {instance_id}"` once an instance ID
/// has been observed, letting the service reject clients attached to a stale
/// document history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub instance_id: Option<String>,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), instance_id: None }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Parse a wire credential back into its parts (used by servers and tests).
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.split_once(' ') {
            Some((token, instance_id)) if !instance_id.trim().is_empty() => {
                Self { token: token.to_string(), instance_id: Some(instance_id.trim().to_string()) }
            }
            _ => Self { token: value.to_string(), instance_id: None },
        }
    }
}

impl fmt::Display for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance_id {
            Some(instance_id) => write!(f, "{} {}", self.token, instance_id),
            None => f.write_str(&self.token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_joins_model_and_id() {
        let identity = DocumentIdentity::new("pentestfinding", "3f1c");
        assert_eq!(identity.channel_name(), "pentestfinding/3f1c");
        assert_eq!(identity.to_string(), "pentestfinding/3f1c");
    }

    #[test]
    fn project_tree_channel_uses_distinct_prefix() {
        assert_eq!(project_tree_channel("p-1"), "project_tree_sync/p-1");
    }

    #[test]
    fn credential_without_instance_id_is_bare_token() {
        assert_eq!(SessionCredential::new("jwt").to_string(), "jwt");
    }

    #[test]
    fn credential_appends_instance_id_space_separated() {
        let credential = SessionCredential::new("jwt").with_instance_id("gen-7");
        assert_eq!(credential.to_string(), "jwt gen-7");
    }

    #[test]
    fn credential_parse_round_trips_both_forms() {
        for credential in
            [SessionCredential::new("a.b.c"), SessionCredential::new("a.b.c").with_instance_id("i")]
        {
            assert_eq!(SessionCredential::parse(&credential.to_string()), credential);
        }
    }
}
