//! Artifact coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Coordinates of an artifact produced or consumed by a pipeline.
///
/// Identity is `(group_id, artifact_id, version, classifier)`. The packaging
/// `artifact_type` is carried along for display only and never takes part in
/// equality, ordering or hashing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(rename = "type", default = "default_artifact_type")]
    pub artifact_type: String,
}

fn default_artifact_type() -> String {
    "jar".to_string()
}

impl ArtifactCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            artifact_type: default_artifact_type(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = artifact_type.into();
        self
    }

    /// `group_id:artifact_id:version`.
    pub fn short_description(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    /// Whether both coordinates name the same module, whatever the version
    /// or classifier.
    pub fn same_module(&self, other: &ArtifactCoordinate) -> bool {
        self.group_id == other.group_id && self.artifact_id == other.artifact_id
    }

    fn identity(&self) -> (&str, &str, &str, Option<&str>) {
        (
            &self.group_id,
            &self.artifact_id,
            &self.version,
            self.classifier.as_deref(),
        )
    }
}

impl PartialEq for ArtifactCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ArtifactCoordinate {}

impl Hash for ArtifactCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for ArtifactCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.artifact_type)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Joins the short descriptions of a set of artifacts, e.g. for log lines.
pub fn describe_artifacts<'a>(artifacts: impl IntoIterator<Item = &'a ArtifactCoordinate>) -> String {
    artifacts
        .into_iter()
        .map(ArtifactCoordinate::short_description)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn test_type_ignored_for_equality() {
        let jar = ArtifactCoordinate::new("g", "a", "1.0");
        let pom = ArtifactCoordinate::new("g", "a", "1.0").with_type("pom");
        assert_eq!(jar, pom);
    }

    #[test]
    fn test_classifier_takes_part_in_identity() {
        let plain = ArtifactCoordinate::new("g", "a", "1.0");
        let sources = ArtifactCoordinate::new("g", "a", "1.0").with_classifier("sources");
        assert_ne!(plain, sources);
        assert!(plain < sources);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let set: BTreeSet<_> = [
            ArtifactCoordinate::new("org.b", "a", "1.0"),
            ArtifactCoordinate::new("org.a", "z", "1.0"),
            ArtifactCoordinate::new("org.a", "b", "2.0"),
            ArtifactCoordinate::new("org.a", "b", "1.0"),
        ]
        .into_iter()
        .collect();

        let ordered: Vec<_> = set.iter().map(|a| a.short_description()).collect();
        assert_eq!(
            ordered,
            vec!["org.a:b:1.0", "org.a:b:2.0", "org.a:z:1.0", "org.b:a:1.0"]
        );
    }

    #[test]
    fn test_same_module_ignores_version() {
        let v1 = ArtifactCoordinate::new("g", "a", "1.0");
        let v2 = ArtifactCoordinate::new("g", "a", "2.0-SNAPSHOT").with_classifier("tests");
        let other = ArtifactCoordinate::new("g", "b", "1.0");
        assert!(v1.same_module(&v2));
        assert!(!v1.same_module(&other));
    }

    #[test]
    fn test_describe_artifacts() {
        let artifacts = [
            ArtifactCoordinate::new("g", "a", "1.0"),
            ArtifactCoordinate::new("g", "b", "1.0"),
        ];
        assert_eq!(describe_artifacts(&artifacts), "g:a:1.0, g:b:1.0");
    }
}
