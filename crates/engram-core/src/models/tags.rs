use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Closed set of subject domains the enricher recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Programming,
    Databases,
    Infrastructure,
    Security,
    DataScience,
    Web,
    Mathematics,
    Writing,
    Business,
    Health,
    Account,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Programming => "programming",
            Self::Databases => "databases",
            Self::Infrastructure => "infrastructure",
            Self::Security => "security",
            Self::DataScience => "data_science",
            Self::Web => "web",
            Self::Mathematics => "mathematics",
            Self::Writing => "writing",
            Self::Business => "business",
            Self::Health => "health",
            Self::Account => "account",
        }
    }
}

/// Typed tag sets attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TagSet {
    pub domains: BTreeSet<Domain>,
    pub topics: BTreeSet<String>,
    pub entities: BTreeSet<String>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.topics.is_empty() && self.entities.is_empty()
    }

    pub fn shares_domain(&self, other: &TagSet) -> bool {
        !self.domains.is_disjoint(&other.domains)
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: &TagSet) {
        self.domains.extend(other.domains.iter().copied());
        self.topics.extend(other.topics.iter().cloned());
        self.entities.extend(other.entities.iter().cloned());
    }
}
