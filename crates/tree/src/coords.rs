use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// `.../repository/<group path>/<artifactId>/<version>/<file>.jar!/<entry>`
static REPOSITORY_JAR_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*/repository/(.+)/([^/]+)/([^/]+)/([^/]+)\.jar!/.*")
        .expect("repository jar pattern is valid")
});

/// `groupId:artifactId:version` of an external dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl DependencyCoordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// Read coordinates out of a jar entry path inside a repository-style layout.
    ///
    /// Returns `None` when the path does not follow the layout.
    pub fn from_jar_path(path: &str) -> Option<Self> {
        let captures = REPOSITORY_JAR_PATH.captures(path)?;
        let group_path = captures.get(1)?.as_str();
        let artifact_id = captures.get(2)?.as_str();
        let version = captures.get(3)?.as_str();
        Some(Self::new(group_path.replace('/', "."), artifact_id, version))
    }
}

impl fmt::Display for DependencyCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}
