use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Protected operation requesting verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionLabel {
    Auth,
    CreateProject,
    CloudSync,
    Other(String),
}

impl ActionLabel {
    pub fn parse(label: &str) -> Self {
        match label {
            "auth" => ActionLabel::Auth,
            "create_project" => ActionLabel::CreateProject,
            "cloud-sync" => ActionLabel::CloudSync,
            other => ActionLabel::Other(other.to_string()),
        }
    }

    /// Label used when the caller does not name one.
    pub fn default_label() -> Self {
        ActionLabel::Other("default".to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionLabel::Auth => "auth",
            ActionLabel::CreateProject => "create_project",
            ActionLabel::CloudSync => "cloud-sync",
            ActionLabel::Other(label) => label,
        }
    }

    /// Tokens for these actions go straight to the authentication provider, which
    /// verifies them itself. Pre-verifying here would spend the single-use token and
    /// the provider would then reject it as already seen.
    pub fn bypasses_endpoint(&self) -> bool {
        matches!(self, ActionLabel::Auth | ActionLabel::CloudSync)
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(ActionLabel::parse(&label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_trust_bootstrapping_actions_bypass() {
        assert!(ActionLabel::parse("auth").bypasses_endpoint());
        assert!(ActionLabel::parse("cloud-sync").bypasses_endpoint());
        assert!(!ActionLabel::parse("create_project").bypasses_endpoint());
        assert!(!ActionLabel::default_label().bypasses_endpoint());
        assert!(!ActionLabel::parse("cloud_sync").bypasses_endpoint());
    }

    #[test]
    fn labels_keep_their_wire_form() {
        for label in ["auth", "create_project", "cloud-sync", "export"] {
            let json = serde_json::to_string(&ActionLabel::parse(label)).unwrap();
            assert_eq!(json, format!("\"{label}\""));
        }
    }
}
