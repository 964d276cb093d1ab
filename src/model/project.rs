//! Project model for tsync.
//!
//! Issues embed a compact project summary so that display identifiers
//! (e.g. "WEB-42") can be rendered without a separate project fetch.

use serde::{Deserialize, Serialize};

/// The project fields embedded in every issue record (`project_detail`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Unique identifier (UUID format)
    pub id: String,

    /// Short uppercase key used as the issue prefix (e.g. "WEB")
    pub identifier: String,

    /// Display name for the project
    #[serde(default)]
    pub name: String,
}

impl ProjectSummary {
    /// Create a summary, deriving the identifier from the name when none is given.
    ///
    /// The derived identifier takes the first four alphanumeric characters
    /// of the name, uppercased.
    pub fn new(id: impl Into<String>, name: impl Into<String>, identifier: Option<&str>) -> Self {
        let name = name.into();
        let identifier = identifier.map_or_else(
            || {
                name.chars()
                    .filter(|c| c.is_alphanumeric())
                    .take(4)
                    .collect::<String>()
                    .to_uppercase()
            },
            str::to_string,
        );

        Self {
            id: id.into(),
            identifier,
            name,
        }
    }

    /// Render the display identifier for an issue sequence number.
    #[must_use]
    pub fn display_id(&self, sequence_id: i64) -> String {
        format!("{}-{}", self.identifier, sequence_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_identifier() {
        let project = ProjectSummary::new("p1", "My Web App", None);
        assert_eq!(project.identifier, "MYWE");

        let explicit = ProjectSummary::new("p2", "Web", Some("WEB"));
        assert_eq!(explicit.identifier, "WEB");
    }

    #[test]
    fn test_display_id() {
        let project = ProjectSummary::new("p1", "Web", Some("WEB"));
        assert_eq!(project.display_id(42), "WEB-42");
    }
}
