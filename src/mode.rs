//! Draft and publish content namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independent content namespaces of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Draft,
    #[default]
    Publish,
}

impl Mode {
    /// Top-level storage namespace under which this mode's objects live.
    pub fn namespace(self) -> &'static str {
        match self {
            Mode::Draft => "drafts",
            Mode::Publish => "sites",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Draft => "draft",
            Mode::Publish => "publish",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_disjoint() {
        assert_eq!(Mode::Publish.namespace(), "sites");
        assert_eq!(Mode::Draft.namespace(), "drafts");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Mode::Draft).unwrap(), "\"draft\"");
        let m: Mode = serde_json::from_str("\"publish\"").unwrap();
        assert_eq!(m, Mode::Publish);
        assert!(serde_json::from_str::<Mode>("\"live\"").is_err());
    }

    #[test]
    fn default_is_publish() {
        assert_eq!(Mode::default(), Mode::Publish);
    }
}
