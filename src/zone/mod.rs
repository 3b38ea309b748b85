use std::collections::HashSet;

use crate::records::fqdn;

/// The location inside a zone holding records for its apex.
pub const APEX_LABEL: &str = "@";

/// One zone's worth of locations, as found in the backend: the set of
/// hash field names under the zone's key.  Queries resolve to one of
/// these locations, or to none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    name: String,
    locations: HashSet<String>,
}

impl Zone {
    pub fn new(name: &str, locations: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: fqdn(name),
            locations: locations.into_iter().collect(),
        }
    }

    /// The zone's fully-qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map a query name to the location whose records answer it.
    ///
    /// A query for the zone name itself resolves to the apex label
    /// without searching.  Otherwise the zone suffix is stripped and
    /// the remainder looked up verbatim; failing that, labels are
    /// stripped from the left one at a time looking for a closest
    /// encloser with a wildcard child, per RFC 4592.  `None` means the
    /// name does not exist in this zone.
    pub fn find_location(&self, query: &str) -> Option<String> {
        let query = fqdn(query);

        if query.eq_ignore_ascii_case(&self.name) {
            return Some(APEX_LABEL.to_string());
        }

        let suffix = format!(".{}", self.name);
        let query = match query.strip_suffix(&suffix) {
            Some(stripped) => stripped,
            None => return None,
        };

        if let Some(location) = self.existing(query) {
            return Some(location);
        }

        let mut remainder = query;
        while !remainder.is_empty() {
            let (closest_encloser, wildcard) = split_query(remainder);
            if self.key_matches(&closest_encloser) || self.key_exists(&closest_encloser) {
                return self.existing(&wildcard);
            }
            remainder = match remainder.split_once('.') {
                Some((_, rest)) => rest,
                None => "",
            };
        }

        None
    }

    fn existing(&self, location: &str) -> Option<String> {
        if self.locations.contains(location) {
            Some(location.to_string())
        } else {
            None
        }
    }

    fn key_exists(&self, key: &str) -> bool {
        self.locations.contains(key)
    }

    // A plain suffix check, deliberately not label-aware: "ba.example"
    // counts "a.example" as an encloser.  Stored data has always been
    // written against this behaviour, so it stays.
    fn key_matches(&self, key: &str) -> bool {
        self.locations.iter().any(|location| location.ends_with(key))
    }
}

/// Split a zone-relative name into its closest encloser (everything
/// after the first label) and the wildcard child of that encloser.
fn split_query(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((_, rest)) => (rest.to_string(), format!("*.{rest}")),
        None => (String::new(), "*".to_string()),
    }
}
