//! Bookkeeping column names

use serde::{Deserialize, Serialize};

/// Names of the columns the versioning engine maintains itself.
///
/// `last_seen` is optional. Leaving it unset disables last-seen tracking,
/// which also makes `identical` rows write nothing and rules out purging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Start of the validity interval
    pub valid_from: String,
    /// End of the validity interval (NULL = open-ended)
    pub valid_to: String,
    /// Version counter
    pub version: String,
    /// Timestamp of the last run that saw the entity
    pub last_seen: Option<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            valid_from: "dateFrom".to_string(),
            valid_to: "dateTo".to_string(),
            version: "version".to_string(),
            last_seen: None,
        }
    }
}

impl FieldNames {
    /// Enable last-seen tracking under the given column name.
    pub fn with_last_seen(mut self, name: impl Into<String>) -> Self {
        self.last_seen = Some(name.into());
        self
    }

    #[inline]
    pub fn tracks_last_seen(&self) -> bool {
        self.last_seen.is_some()
    }

    /// All configured bookkeeping column names.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.valid_from.as_str()),
            Some(self.valid_to.as_str()),
            Some(self.version.as_str()),
            self.last_seen.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let names = FieldNames::default();
        assert_eq!(names.valid_from, "dateFrom");
        assert_eq!(names.valid_to, "dateTo");
        assert_eq!(names.version, "version");
        assert!(!names.tracks_last_seen());
        assert_eq!(names.all().count(), 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let names: FieldNames = serde_json::from_str(r#"{"last_seen": "dateLastSeen"}"#).unwrap();
        assert_eq!(names.valid_from, "dateFrom");
        assert_eq!(names.last_seen.as_deref(), Some("dateLastSeen"));
        assert_eq!(names.all().count(), 4);
    }
}
