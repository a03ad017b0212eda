//! Author policy table and resolution
//!
//! The table maps an author identity to a policy label. It is loaded once at
//! startup and never changes afterwards; resolution is an exact-match lookup
//! that fails closed to [`Disposition::ManualBuild`].

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Policy label as written in the policy file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyLabel {
    /// `"autoBuild"`
    AutoBuild,
    /// `"noBuild"`
    NoBuild,
    /// `"skipBuild"`
    SkipBuild,
    /// `"manualBuild"`
    ManualBuild,
    /// Any other value, kept verbatim
    Unknown(String),
}

impl PolicyLabel {
    /// Wire form of the label
    pub fn as_str(&self) -> &str {
        match self {
            PolicyLabel::AutoBuild => "autoBuild",
            PolicyLabel::NoBuild => "noBuild",
            PolicyLabel::SkipBuild => "skipBuild",
            PolicyLabel::ManualBuild => "manualBuild",
            PolicyLabel::Unknown(raw) => raw,
        }
    }
}

impl From<String> for PolicyLabel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "autoBuild" => PolicyLabel::AutoBuild,
            "noBuild" => PolicyLabel::NoBuild,
            "skipBuild" => PolicyLabel::SkipBuild,
            "manualBuild" => PolicyLabel::ManualBuild,
            _ => PolicyLabel::Unknown(raw),
        }
    }
}

impl From<&str> for PolicyLabel {
    fn from(raw: &str) -> Self {
        PolicyLabel::from(raw.to_string())
    }
}

impl From<PolicyLabel> for String {
    fn from(label: PolicyLabel) -> Self {
        match label {
            PolicyLabel::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PolicyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gate does with a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    /// Build proceeds
    AutoBuild,
    /// Build is rejected outright
    NoBuild,
    /// Build is skipped
    SkipBuild,
    /// Build waits for a human
    ManualBuild,
}

impl Disposition {
    /// Whether the build may proceed without intervention
    pub fn is_allowed(&self) -> bool {
        matches!(self, Disposition::AutoBuild)
    }
}

impl From<&PolicyLabel> for Disposition {
    fn from(label: &PolicyLabel) -> Self {
        match label {
            PolicyLabel::AutoBuild => Disposition::AutoBuild,
            PolicyLabel::NoBuild => Disposition::NoBuild,
            PolicyLabel::SkipBuild => Disposition::SkipBuild,
            PolicyLabel::ManualBuild => Disposition::ManualBuild,
            // Unrecognised labels must never auto-build.
            PolicyLabel::Unknown(_) => Disposition::ManualBuild,
        }
    }
}

/// Immutable author → label mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable {
    entries: HashMap<String, PolicyLabel>,
}

impl PolicyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(author, label)` pairs
    pub fn from_entries<I, A, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, L)>,
        A: Into<String>,
        L: Into<PolicyLabel>,
    {
        PolicyTable {
            entries: entries
                .into_iter()
                .map(|(author, label)| (author.into(), label.into()))
                .collect(),
        }
    }

    /// Decode a JSON object of author → label strings
    ///
    /// A literal `null` decodes to an empty table.
    pub fn from_json_str(source: &str) -> std::result::Result<Self, serde_json::Error> {
        let entries: Option<HashMap<String, PolicyLabel>> = serde_json::from_str(source)?;
        Ok(PolicyTable {
            entries: entries.unwrap_or_default(),
        })
    }

    /// Decode a TOML table of author → label strings
    pub fn from_toml_str(source: &str) -> std::result::Result<Self, toml::de::Error> {
        let entries: HashMap<String, PolicyLabel> = toml::from_str(source)?;
        Ok(PolicyTable { entries })
    }

    /// Load a policy file, choosing the decoder from its extension
    ///
    /// `.toml` files are decoded as TOML; everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| GateError::PolicyIo {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let decoded = if is_toml {
            Self::from_toml_str(&source).map_err(|e| e.to_string())
        } else {
            Self::from_json_str(&source).map_err(|e| e.to_string())
        };

        decoded.map_err(|reason| GateError::PolicyDecode {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Label configured for an author, if any
    pub fn get(&self, author: &str) -> Option<&PolicyLabel> {
        self.entries.get(author)
    }

    /// Resolve an author to a disposition
    pub fn resolve(&self, author: &str) -> Disposition {
        resolve(author, self)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(author, label)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyLabel)> {
        self.entries.iter().map(|(author, label)| (author.as_str(), label))
    }

    /// Count entries per label
    pub fn summary(&self) -> PolicySummary {
        let mut summary = PolicySummary::default();
        for (author, label) in self.iter() {
            match label {
                PolicyLabel::AutoBuild => summary.auto_build += 1,
                PolicyLabel::NoBuild => summary.no_build += 1,
                PolicyLabel::SkipBuild => summary.skip_build += 1,
                PolicyLabel::ManualBuild => summary.manual_build += 1,
                PolicyLabel::Unknown(raw) => {
                    summary.unknown.push((author.to_string(), raw.clone()));
                }
            }
        }
        summary.unknown.sort();
        summary
    }
}

/// Per-label entry counts of a [`PolicyTable`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    /// Entries labelled `autoBuild`
    pub auto_build: usize,
    /// Entries labelled `noBuild`
    pub no_build: usize,
    /// Entries labelled `skipBuild`
    pub skip_build: usize,
    /// Entries labelled `manualBuild`
    pub manual_build: usize,
    /// `(author, label)` for unrecognised labels, sorted by author
    pub unknown: Vec<(String, String)>,
}

/// Resolve an author against a policy table
///
/// Absent authors resolve to [`Disposition::ManualBuild`].
pub fn resolve(author: &str, table: &PolicyTable) -> Disposition {
    table
        .get(author)
        .map(Disposition::from)
        .unwrap_or(Disposition::ManualBuild)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::Builder;

    fn scenario_table() -> PolicyTable {
        PolicyTable::from_entries([
            ("alice", "autoBuild"),
            ("bob", "noBuild"),
            ("dave", "skipBuild"),
            ("erin", "manualBuild"),
            ("frank", "superBuild"),
        ])
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(PolicyLabel::from("autoBuild"), PolicyLabel::AutoBuild);
        assert_eq!(PolicyLabel::from("noBuild"), PolicyLabel::NoBuild);
        assert_eq!(PolicyLabel::from("skipBuild"), PolicyLabel::SkipBuild);
        assert_eq!(PolicyLabel::from("manualBuild"), PolicyLabel::ManualBuild);
        assert_eq!(
            PolicyLabel::from("AutoBuild"),
            PolicyLabel::Unknown("AutoBuild".to_string())
        );
        assert_eq!(PolicyLabel::from("").as_str(), "");
    }

    #[test]
    fn test_resolve_known_labels() {
        let table = scenario_table();
        assert_eq!(resolve("alice", &table), Disposition::AutoBuild);
        assert_eq!(resolve("bob", &table), Disposition::NoBuild);
        assert_eq!(resolve("dave", &table), Disposition::SkipBuild);
        assert_eq!(resolve("erin", &table), Disposition::ManualBuild);
    }

    #[test]
    fn test_resolve_fails_closed() {
        let table = scenario_table();
        assert_eq!(resolve("frank", &table), Disposition::ManualBuild);
        assert_eq!(resolve("carol", &table), Disposition::ManualBuild);
        assert_eq!(resolve("", &table), Disposition::ManualBuild);
        assert_eq!(resolve("ALICE", &table), Disposition::ManualBuild);
        assert_eq!(resolve("alice ", &table), Disposition::ManualBuild);
    }

    #[test]
    fn test_from_json() {
        let table =
            PolicyTable::from_json_str(r#"{"alice":"autoBuild","bob":"noBuild"}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("alice"), Some(&PolicyLabel::AutoBuild));

        let empty = PolicyTable::from_json_str("null").unwrap();
        assert!(empty.is_empty());

        assert!(PolicyTable::from_json_str(r#"{"alice": 1}"#).is_err());
        assert!(PolicyTable::from_json_str(r#"["alice"]"#).is_err());
        assert!(PolicyTable::from_json_str("{").is_err());
    }

    #[test]
    fn test_from_toml() {
        let table = PolicyTable::from_toml_str(
            r#"
alice = "autoBuild"
"bot[ci]" = "skipBuild"
"#,
        )
        .unwrap();
        assert_eq!(table.resolve("alice"), Disposition::AutoBuild);
        assert_eq!(table.resolve("bot[ci]"), Disposition::SkipBuild);
        assert!(PolicyTable::from_toml_str("alice = 3").is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let mut json = Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"alice":"autoBuild"}}"#).unwrap();
        let table = PolicyTable::load(json.path()).unwrap();
        assert_eq!(table.resolve("alice"), Disposition::AutoBuild);

        let mut toml_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, r#"bob = "noBuild""#).unwrap();
        let table = PolicyTable::load(toml_file.path()).unwrap();
        assert_eq!(table.resolve("bob"), Disposition::NoBuild);
    }

    #[test]
    fn test_load_errors() {
        let err = PolicyTable::load("/nonexistent/users.json").unwrap_err();
        assert!(matches!(err, GateError::PolicyIo { .. }));

        let mut bad = Builder::new().suffix(".json").tempfile().unwrap();
        write!(bad, "not json").unwrap();
        let err = PolicyTable::load(bad.path()).unwrap_err();
        assert!(matches!(err, GateError::PolicyDecode { .. }));
    }

    #[test]
    fn test_summary() {
        let summary = scenario_table().summary();
        assert_eq!(summary.auto_build, 1);
        assert_eq!(summary.no_build, 1);
        assert_eq!(summary.skip_build, 1);
        assert_eq!(summary.manual_build, 1);
        assert_eq!(
            summary.unknown,
            vec![("frank".to_string(), "superBuild".to_string())]
        );
    }

    #[test]
    fn test_label_serialization() {
        let table = PolicyTable::from_entries([("x", "weird")]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"x":"weird"}"#);
    }

    proptest! {
        #[test]
        fn prop_absent_author_needs_manual_build(author in ".*") {
            let table = PolicyTable::new();
            prop_assert_eq!(resolve(&author, &table), Disposition::ManualBuild);
        }

        #[test]
        fn prop_resolution_is_idempotent(author in "[a-z]{0,8}", label in "[a-zA-Z]{0,12}") {
            let table = PolicyTable::from_entries([(author.clone(), label)]);
            let first = resolve(&author, &table);
            for _ in 0..3 {
                prop_assert_eq!(resolve(&author, &table), first);
            }
        }

        #[test]
        fn prop_unknown_label_needs_manual_build(author in ".*", label in "[a-z]{1,10}") {
            let table = PolicyTable::from_entries([(author.clone(), label)]);
            prop_assert_eq!(resolve(&author, &table), Disposition::ManualBuild);
        }
    }
}
