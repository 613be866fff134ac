use std::collections::BTreeMap;

use models::{Alias, Error, ErrorCode};

/// AliasIndex maintains a per-group bijection between human aliases and blob
/// identifiers. Aliases are unique within a group and freely reusable across
/// groups. The index is derived from blob metadata and rebuilt after every
/// mutation of the catalogue.
#[derive(Debug, Default, Clone)]
pub struct AliasIndex {
    // group -> alias -> guid
    forward: BTreeMap<String, BTreeMap<String, String>>,
    // guid -> alias
    reverse: BTreeMap<String, String>,
}

impl AliasIndex {
    /// Register `alias` for `guid` within `group`. Fails with
    /// `INVALID_OPERATION` when the alias is malformed or already used in
    /// that group.
    pub fn register(&mut self, alias: &str, guid: &str, group: &str) -> Result<(), Error> {
        let alias = Alias::parse(alias)?;
        let group_map = self.forward.entry(group.to_string()).or_default();
        if group_map.contains_key(alias.as_str()) {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("alias '{alias}' is already in use within group '{group}'"),
            ));
        }
        group_map.insert(alias.as_str().to_string(), guid.to_string());
        self.reverse
            .insert(guid.to_string(), alias.as_str().to_string());
        Ok(())
    }

    /// Remove `alias` from `group`. Idempotent: removing an absent alias is
    /// not an error.
    pub fn unregister(&mut self, alias: &str, group: &str) -> bool {
        let Some(group_map) = self.forward.get_mut(group) else {
            return false;
        };
        match group_map.remove(alias) {
            Some(guid) => {
                self.reverse.remove(&guid);
                true
            }
            None => false,
        }
    }

    /// Resolve `identifier` within `group`: a parseable UUID resolves to
    /// itself, otherwise the alias is looked up. Returns `None` on a miss.
    pub fn resolve(&self, identifier: &str, group: &str) -> Option<String> {
        if let Some(guid) = models::parse_guid(identifier) {
            return Some(guid);
        }
        self.forward.get(group)?.get(identifier).cloned()
    }

    /// The alias registered for `guid`, if any.
    pub fn alias_of(&self, guid: &str) -> Option<&str> {
        self.reverse.get(guid).map(String::as_str)
    }

    /// All aliases within a group, alias -> guid.
    pub fn list(&self, group: &str) -> BTreeMap<String, String> {
        self.forward.get(group).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID_A: &str = "11111111-1111-4111-8111-111111111111";
    const GUID_B: &str = "22222222-2222-4222-8222-222222222222";

    #[test]
    fn register_resolve_unregister_round_trip() {
        let mut index = AliasIndex::default();
        index.register("q3-report", GUID_A, "finance").unwrap();

        assert_eq!(
            index.resolve("q3-report", "finance").as_deref(),
            Some(GUID_A)
        );
        assert_eq!(index.alias_of(GUID_A), Some("q3-report"));

        assert!(index.unregister("q3-report", "finance"));
        assert_eq!(index.resolve("q3-report", "finance"), None);
        // Idempotent.
        assert!(!index.unregister("q3-report", "finance"));
    }

    #[test]
    fn same_alias_may_denote_different_guids_across_groups() {
        let mut index = AliasIndex::default();
        index.register("report", GUID_A, "alpha").unwrap();
        index.register("report", GUID_B, "beta").unwrap();

        assert_ne!(
            index.resolve("report", "alpha"),
            index.resolve("report", "beta")
        );
    }

    #[test]
    fn duplicate_within_group_fails() {
        let mut index = AliasIndex::default();
        index.register("report", GUID_A, "alpha").unwrap();
        let err = index.register("report", GUID_B, "alpha").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn malformed_aliases_fail() {
        let mut index = AliasIndex::default();
        for bad in ["ab", "has space", ""] {
            let err = index.register(bad, GUID_A, "alpha").unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidOperation);
        }
    }

    #[test]
    fn uuids_resolve_without_registration() {
        let index = AliasIndex::default();
        assert_eq!(index.resolve(GUID_A, "any").as_deref(), Some(GUID_A));
        assert_eq!(index.resolve("not-a-guid-or-alias", "any"), None);
    }
}
