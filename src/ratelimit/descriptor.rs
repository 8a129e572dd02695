//! Counter key generation.

use std::fmt;

use super::clock::WindowInstant;
use super::counter::Tier;

/// A key that uniquely identifies one counter in the store.
///
/// The layout is `Source:<id>:[User:<uid>:]<Hour|Day>:<index>`. Every request
/// for the same scope within the same hour (or day) maps to the same key,
/// which is what makes the counter count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    /// Build the key for a tier at the given instant.
    ///
    /// The user segment is only written for user-scoped tiers, and only when
    /// a user is present. Global tiers always share one key per data source.
    pub fn build(
        data_source: &str,
        user: Option<&str>,
        tier: Tier,
        now: WindowInstant,
    ) -> Self {
        let mut key = format!("Source:{}:", data_source);

        if tier.is_user_scoped() {
            if let Some(user) = user {
                key.push_str("User:");
                key.push_str(user);
                key.push(':');
            }
        }

        let window = tier.window();
        key.push_str(window.label());
        key.push(':');
        key.push_str(&window.index(now).to_string());

        Self(key)
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CounterKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
