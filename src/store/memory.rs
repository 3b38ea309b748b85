use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Error, ScanPage, Store, NO_SUCH_KEY};

/// An in-memory [`Store`] with a virtual clock, for tests and for
/// running the engine without a backend.
///
/// Cloning yields a handle onto the same data.  Expiring keys are
/// tracked against the virtual clock, which only moves when
/// [`MemoryStore::advance`] is called, so decay behaviour is exactly
/// reproducible.  A store can also be made to fail on demand, to
/// exercise unavailable-backend paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, String>>,
    // plain key to (value, expiry in virtual seconds; None = no expiry)
    strings: HashMap<String, (String, Option<u64>)>,
    now: u64,
    failing: bool,
}

impl Inner {
    fn live_string(&self, key: &str) -> Option<&(String, Option<u64>)> {
        match self.strings.get(key) {
            Some(entry) => match entry.1 {
                Some(expiry) if expiry <= self.now => None,
                _ => Some(entry),
            },
            None => None,
        }
    }

    fn live_keys(&self, pattern: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .hashes
            .keys()
            .chain(
                self.strings
                    .keys()
                    .filter(|k| self.live_string(k).is_some()),
            )
            .filter(|k| glob_matches(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

// Only `*` is special, which is all the key schema ever produces.
fn glob_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    match parts.as_slice() {
        [exact] => key == *exact,
        [first, rest @ ..] => {
            if !key.starts_with(first) {
                return false;
            }
            let mut remaining = &key[first.len()..];
            for (i, part) in rest.iter().enumerate() {
                if i == rest.len() - 1 {
                    return remaining.ends_with(part);
                }
                match remaining.find(part) {
                    Some(at) => remaining = &remaining[at + part.len()..],
                    None => return false,
                }
            }
            true
        }
        [] => key.is_empty(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward, expiring any keys whose time has
    /// come.
    pub fn advance(&self, seconds: u64) {
        let mut inner = self.lock();
        inner.now += seconds;
    }

    /// Make every subsequent operation fail as unavailable, or restore
    /// service.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Seed a plain key without an expiry.
    pub fn put_string(&self, key: &str, value: &str) {
        self.lock()
            .strings
            .insert(key.to_string(), (value.to_string(), None));
    }

    /// Seed a whole hash at once.
    pub fn put_hash(&self, key: &str, fields: &[(&str, &str)]) {
        let entry = fields
            .iter()
            .map(|(f, v)| ((*f).to_string(), (*v).to_string()))
            .collect();
        self.lock().hashes.insert(key.to_string(), entry);
    }

    /// The remaining virtual lifetime of a key, [`NO_SUCH_KEY`] if it
    /// is absent or already expired.
    pub fn remaining(&self, key: &str) -> i64 {
        let inner = self.lock();
        match inner.live_string(key) {
            Some((_, Some(expiry))) => i64::try_from(expiry - inner.now).unwrap_or(i64::MAX),
            Some((_, None)) => -1,
            None => NO_SUCH_KEY,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check(&self, inner: &Inner) -> Result<(), Error> {
        if inner.failing {
            Err(Error::Unavailable {
                detail: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Store for MemoryStore {
    fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        let inner = self.lock();
        self.check(&inner)?;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|fields| fields.get(field))
            .cloned())
    }

    fn list_fields(&self, key: &str) -> Result<Vec<String>, Error> {
        let inner = self.lock();
        self.check(&inner)?;
        let mut fields: Vec<String> = inner
            .hashes
            .get(key)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        fields.sort();
        Ok(fields)
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), Error> {
        let mut inner = self.lock();
        self.check(&inner)?;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn get_row(&self, key: &str, ttl_key: &str) -> Result<(Option<String>, i64), Error> {
        let inner = self.lock();
        self.check(&inner)?;
        let value = inner.live_string(key).map(|(v, _)| v.clone());
        let remaining = match inner.live_string(ttl_key) {
            Some((_, Some(expiry))) => i64::try_from(expiry - inner.now).unwrap_or(i64::MAX),
            Some((_, None)) => -1,
            None => NO_SUCH_KEY,
        };
        Ok((value, remaining))
    }

    fn set_with_expiry(&self, key: &str, value: &str, seconds: u32) -> Result<(), Error> {
        let mut inner = self.lock();
        self.check(&inner)?;
        let expiry = inner.now + u64::from(seconds);
        inner
            .strings
            .insert(key.to_string(), (value.to_string(), Some(expiry)));
        Ok(())
    }

    fn scan_keys(&self, cursor: u64, pattern: &str, batch: usize) -> Result<ScanPage, Error> {
        let inner = self.lock();
        self.check(&inner)?;
        let keys = inner.live_keys(pattern);
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(keys.len());
        let end = (start + batch).min(keys.len());
        let next = if end == keys.len() { 0 } else { end as u64 };
        Ok(ScanPage {
            cursor: next,
            keys: keys[start..end].to_vec(),
        })
    }

    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let inner = self.lock();
        self.check(&inner)?;
        Ok(inner.live_keys(pattern))
    }

    fn size(&self) -> Result<i64, Error> {
        let inner = self.lock();
        self.check(&inner)?;
        let live = inner.hashes.len()
            + inner
                .strings
                .keys()
                .filter(|k| inner.live_string(k).is_some())
                .count();
        Ok(i64::try_from(live).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_operations() {
        let store = MemoryStore::new();
        store.set_field("zone", "www", "{}").unwrap();
        store.set_field("zone", "@", "{}").unwrap();

        assert_eq!(Some("{}".to_string()), store.get_field("zone", "www").unwrap());
        assert_eq!(None, store.get_field("zone", "mail").unwrap());
        assert_eq!(
            vec!["@".to_string(), "www".to_string()],
            store.list_fields("zone").unwrap()
        );
    }

    #[test]
    fn expiry_follows_virtual_clock() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", "v", 30).unwrap();

        assert_eq!((Some("v".to_string()), NO_SUCH_KEY), store.get_row("k", "absent").unwrap());
        assert_eq!((Some("v".to_string()), 30), store.get_row("k", "k").unwrap());

        store.advance(10);
        assert_eq!((Some("v".to_string()), 20), store.get_row("k", "k").unwrap());

        store.advance(20);
        assert_eq!((None, NO_SUCH_KEY), store.get_row("k", "k").unwrap());
    }

    #[test]
    fn scan_pages_and_terminates() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put_string(&format!("dns:k{i}"), "v");
        }
        store.put_string("other", "v");

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = store.scan_keys(cursor, "dns:*", 2).unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(5, seen.len());
        assert!(seen.iter().all(|k| k.starts_with("dns:")));
    }

    #[test]
    fn failing_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.get_field("zone", "www"),
            Err(Error::Unavailable { .. })
        ));
    }

    #[test]
    fn glob_matching() {
        assert!(glob_matches("dns:*", "dns:example.com."));
        assert!(glob_matches("dns:*:prod", "dns:example.com.:prod"));
        assert!(!glob_matches("dns:*:prod", "dns:example.com."));
        assert!(glob_matches("*", "anything"));
        assert!(!glob_matches("exact", "exactly"));
    }
}
