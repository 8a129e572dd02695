//! Quota table configuration.
//!
//! The quota table maps each data source to the four tier thresholds that
//! apply to it. It is loaded once at startup and never mutated afterwards,
//! so it can be shared across requests without synchronization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::counter::Tier;
use crate::error::{Result, TurnstileError};

/// Thresholds for a single data source.
///
/// A missing tier means that tier is not limited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaThresholds {
    #[serde(rename = "UserHourly", default, skip_serializing_if = "Option::is_none")]
    pub user_hourly: Option<u64>,
    #[serde(rename = "UserDaily", default, skip_serializing_if = "Option::is_none")]
    pub user_daily: Option<u64>,
    #[serde(rename = "GlobalHourly", default, skip_serializing_if = "Option::is_none")]
    pub global_hourly: Option<u64>,
    #[serde(rename = "GlobalDaily", default, skip_serializing_if = "Option::is_none")]
    pub global_daily: Option<u64>,
}

impl QuotaThresholds {
    /// Thresholds with no tier limited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold of a tier.
    pub fn with(mut self, tier: Tier, limit: u64) -> Self {
        *self.slot(tier) = Some(limit);
        self
    }

    /// Get the threshold of a tier, if it is limited.
    pub fn get(&self, tier: Tier) -> Option<u64> {
        match tier {
            Tier::UserHourly => self.user_hourly,
            Tier::UserDaily => self.user_daily,
            Tier::GlobalHourly => self.global_hourly,
            Tier::GlobalDaily => self.global_daily,
        }
    }

    /// The tiers to check for a request, in evaluation order.
    ///
    /// Unlimited tiers are skipped, and user tiers are skipped entirely when
    /// the request carries no user.
    pub fn applicable(&self, has_user: bool) -> impl Iterator<Item = (Tier, u64)> + '_ {
        Tier::ALL
            .into_iter()
            .filter(move |tier| has_user || !tier.is_user_scoped())
            .filter_map(move |tier| self.get(tier).map(|limit| (tier, limit)))
    }

    fn slot(&mut self, tier: Tier) -> &mut Option<u64> {
        match tier {
            Tier::UserHourly => &mut self.user_hourly,
            Tier::UserDaily => &mut self.user_daily,
            Tier::GlobalHourly => &mut self.global_hourly,
            Tier::GlobalDaily => &mut self.global_daily,
        }
    }
}

/// Static mapping from data source id to its thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaTable {
    sources: HashMap<String, QuotaThresholds>,
}

impl QuotaTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the thresholds of a data source.
    pub fn insert(&mut self, data_source: impl Into<String>, thresholds: QuotaThresholds) {
        self.sources.insert(data_source.into(), thresholds);
    }

    /// Builder-style variant of [`QuotaTable::insert`].
    pub fn with_source(
        mut self,
        data_source: impl Into<String>,
        thresholds: QuotaThresholds,
    ) -> Self {
        self.insert(data_source, thresholds);
        self
    }

    /// Load the table from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading quota table");

        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_yaml(&contents)?;

        info!(data_sources = table.len(), "Quota table loaded");
        Ok(table)
    }

    /// Load the table from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse quota table: {}", e)))
    }

    /// Look up the thresholds of a data source.
    pub fn lookup(&self, data_source: &str) -> Option<&QuotaThresholds> {
        self.sources.get(data_source)
    }

    /// Number of configured data sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no data source is configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, QuotaThresholds)> for QuotaTable {
    fn from_iter<I: IntoIterator<Item = (S, QuotaThresholds)>>(iter: I) -> Self {
        Self {
            sources: iter
                .into_iter()
                .map(|(source, thresholds)| (source.into(), thresholds))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_table() {
        let yaml = r#"
DataSourceA:
  UserHourly: 150
  UserDaily: 2000
  GlobalHourly: 100000
  GlobalDaily: 1000000
DataSourceB:
  GlobalHourly: 10
"#;
        let table = QuotaTable::from_yaml(yaml).unwrap();
        assert_eq!(table.len(), 2);

        let a = table.lookup("DataSourceA").unwrap();
        assert_eq!(a.get(Tier::UserHourly), Some(150));
        assert_eq!(a.get(Tier::UserDaily), Some(2000));
        assert_eq!(a.get(Tier::GlobalHourly), Some(100000));
        assert_eq!(a.get(Tier::GlobalDaily), Some(1000000));

        let b = table.lookup("DataSourceB").unwrap();
        assert_eq!(b.get(Tier::UserHourly), None);
        assert_eq!(b.get(Tier::GlobalHourly), Some(10));
    }

    #[test]
    fn test_source_without_limits() {
        let table = QuotaTable::from_yaml("Open: {}\n").unwrap();
        let open = table.lookup("Open").unwrap();
        assert_eq!(open.applicable(true).count(), 0);
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let yaml = r#"
DataSourceA:
  UserWeekly: 5
"#;
        let err = QuotaTable::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_lookup_unknown_source() {
        let table = QuotaTable::new().with_source("A", QuotaThresholds::new());
        assert!(table.lookup("A").is_some());
        assert!(table.lookup("B").is_none());
    }

    #[test]
    fn test_applicable_order_and_skips() {
        let thresholds = QuotaThresholds::new()
            .with(Tier::GlobalDaily, 4)
            .with(Tier::UserHourly, 1)
            .with(Tier::GlobalHourly, 3);

        let with_user: Vec<_> = thresholds.applicable(true).collect();
        assert_eq!(
            with_user,
            vec![
                (Tier::UserHourly, 1),
                (Tier::GlobalHourly, 3),
                (Tier::GlobalDaily, 4)
            ]
        );

        let without_user: Vec<_> = thresholds.applicable(false).collect();
        assert_eq!(
            without_user,
            vec![(Tier::GlobalHourly, 3), (Tier::GlobalDaily, 4)]
        );
    }

    #[test]
    fn test_from_iterator() {
        let table: QuotaTable = vec![
            ("A", QuotaThresholds::new().with(Tier::UserHourly, 5)),
            ("B", QuotaThresholds::new()),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
    }
}
