use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;

use crate::records::fqdn;
use crate::store::{Error, KeySchema, ScanPage, Store};

/// How many keys to ask for per scan page during zone discovery.
pub const SCAN_BATCH_SIZE: usize = 1000;

/// The key count reported when the backend would not say.
pub const UNKNOWN_KEY_COUNT: i64 = -1;

/// An immutable snapshot of the zones the backend holds.  Refresh
/// builds a whole new list and swaps it in; readers hold on to the
/// snapshot they started with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneList {
    pub zones: Vec<String>,
    pub refreshed_at: Option<SystemTime>,
    pub key_count: i64,
}

impl ZoneList {
    /// The longest zone this query name falls under, if any.  This is
    /// how the embedding server decides whether a query is ours.
    pub fn matching_zone(&self, qname: &str) -> Option<&str> {
        let qname = fqdn(qname);
        self.zones
            .iter()
            .filter(|zone| {
                qname == **zone || qname.ends_with(&format!(".{zone}"))
            })
            .max_by_key(|zone| zone.len())
            .map(String::as_str)
    }
}

/// How the catalog enumerates zone keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Page through the keyspace with a cursor scan.  Never blocks the
    /// backend, so this is the default.
    Scan,
    /// One blocking round trip listing every matching key.  Fine for
    /// small keyspaces.
    List,
}

/// Maintains the zone list by polling the backend, publishing each
/// snapshot through a watch channel so request handlers read it
/// without locking.
///
/// The refresh cadence is the embedder's concern; the catalog only
/// does the work when told to.  If discovery fails the previous
/// snapshot stays in effect, so a backend outage degrades to stale
/// zones rather than no zones.
pub struct ZoneCatalog<S> {
    store: S,
    schema: KeySchema,
    discovery: Discovery,
    tx: watch::Sender<Arc<ZoneList>>,
}

impl<S: Store> ZoneCatalog<S> {
    pub fn new(store: S, schema: KeySchema, discovery: Discovery) -> Self {
        let (tx, _) = watch::channel(Arc::new(ZoneList::default()));
        Self {
            store,
            schema,
            discovery,
            tx,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ZoneList> {
        self.tx.borrow().clone()
    }

    /// A receiver that yields each new snapshot as it is published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ZoneList>> {
        self.tx.subscribe()
    }

    /// Rebuild the zone list from the backend and publish it.  On
    /// failure the previous snapshot is kept and `Err` returned, so
    /// the embedder can decide whether to log or alert.
    pub fn refresh(&self) -> Result<Arc<ZoneList>, Error> {
        let zones = match self.discover() {
            Ok(zones) => zones,
            Err(error) => {
                tracing::debug!(%error, "zone discovery failed, keeping previous zone list");
                return Err(error);
            }
        };

        let key_count = match self.store.size() {
            Ok(count) => count,
            Err(error) => {
                tracing::debug!(%error, "could not count backend keys");
                UNKNOWN_KEY_COUNT
            }
        };

        let snapshot = Arc::new(ZoneList {
            zones,
            refreshed_at: Some(SystemTime::now()),
            key_count,
        });
        self.tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    fn discover(&self) -> Result<Vec<String>, Error> {
        let pattern = self.schema.pattern();
        let keys = match self.discovery {
            Discovery::List => self.store.list_keys(&pattern)?,
            Discovery::Scan => {
                let mut keys = Vec::new();
                let mut cursor = 0;
                loop {
                    let ScanPage {
                        cursor: next,
                        keys: page,
                    } = self.store.scan_keys(cursor, &pattern, SCAN_BATCH_SIZE)?;
                    keys.extend(page);
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                keys
            }
        };

        // a key can reappear across scan pages; the first sighting wins
        let mut zones: Vec<String> = Vec::with_capacity(keys.len());
        for key in &keys {
            let zone = self.schema.strip(key).to_string();
            if !zones.contains(&zone) {
                zones.push(zone);
            }
        }
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    #[test]
    fn refresh_publishes_discovered_zones() {
        let store = MemoryStore::new();
        store.put_hash("dns:example.com.", &[("@", "{}")]);
        store.put_hash("dns:example.net.", &[("@", "{}")]);
        let catalog = ZoneCatalog::new(store, KeySchema::new("dns:", ""), Discovery::Scan);

        let snapshot = catalog.refresh().unwrap();
        assert_eq!(
            vec!["example.com.".to_string(), "example.net.".to_string()],
            snapshot.zones
        );
        assert_eq!(2, snapshot.key_count);
        assert!(snapshot.refreshed_at.is_some());
    }

    #[test]
    fn list_discovery_matches_scan_discovery() {
        let store = MemoryStore::new();
        store.put_hash("dns:example.com.", &[("@", "{}")]);
        let scan = ZoneCatalog::new(store.clone(), KeySchema::new("dns:", ""), Discovery::Scan);
        let list = ZoneCatalog::new(store, KeySchema::new("dns:", ""), Discovery::List);

        assert_eq!(scan.refresh().unwrap().zones, list.refresh().unwrap().zones);
    }

    #[test]
    fn failed_refresh_keeps_the_previous_snapshot() {
        let store = MemoryStore::new();
        store.put_hash("dns:example.com.", &[("@", "{}")]);
        let catalog = ZoneCatalog::new(store.clone(), KeySchema::new("dns:", ""), Discovery::Scan);

        let before = catalog.refresh().unwrap();

        store.set_failing(true);
        assert!(catalog.refresh().is_err());
        assert_eq!(before, catalog.snapshot());
    }

    #[test]
    fn key_count_failure_is_not_fatal() {
        let catalog = ZoneCatalog::new(
            HalfFailingStore::default(),
            KeySchema::new("dns:", ""),
            Discovery::Scan,
        );

        let snapshot = catalog.refresh().unwrap();
        assert_eq!(UNKNOWN_KEY_COUNT, snapshot.key_count);
    }

    #[test]
    fn duplicate_keys_across_pages_keep_the_first_sighting() {
        let store = ScriptedStore::new(vec![
            ScanPage {
                cursor: 7,
                keys: vec!["dns:example.com.".to_string(), "dns:example.net.".to_string()],
            },
            ScanPage {
                cursor: 0,
                keys: vec!["dns:example.com.".to_string(), "dns:example.org.".to_string()],
            },
        ]);
        let catalog = ZoneCatalog::new(store, KeySchema::new("dns:", ""), Discovery::Scan);

        let snapshot = catalog.refresh().unwrap();
        assert_eq!(
            vec![
                "example.com.".to_string(),
                "example.net.".to_string(),
                "example.org.".to_string(),
            ],
            snapshot.zones
        );
    }

    #[test]
    fn subscribers_see_each_new_snapshot() {
        let store = MemoryStore::new();
        store.put_hash("dns:example.com.", &[("@", "{}")]);
        let catalog = ZoneCatalog::new(store.clone(), KeySchema::new("dns:", ""), Discovery::Scan);

        let rx = catalog.subscribe();
        catalog.refresh().unwrap();
        assert_eq!(
            vec!["example.com.".to_string()],
            rx.borrow().zones
        );

        store.put_hash("dns:example.net.", &[("@", "{}")]);
        catalog.refresh().unwrap();
        assert_eq!(2, rx.borrow().zones.len());
    }

    #[test]
    fn matching_zone_prefers_the_longest_suffix() {
        let list = ZoneList {
            zones: vec!["example.com.".to_string(), "sub.example.com.".to_string()],
            refreshed_at: None,
            key_count: 2,
        };

        assert_eq!(Some("sub.example.com."), list.matching_zone("www.sub.example.com."));
        assert_eq!(Some("example.com."), list.matching_zone("www.example.com."));
        assert_eq!(Some("example.com."), list.matching_zone("example.com"));
        assert_eq!(None, list.matching_zone("example.org."));
        // a name merely ending in the zone string is not inside it
        assert_eq!(None, list.matching_zone("notexample.com."));
    }

    /// Serves scripted scan pages, for shapes the in-memory store
    /// cannot produce.
    struct ScriptedStore {
        pages: Mutex<Vec<ScanPage>>,
    }

    impl ScriptedStore {
        fn new(pages: Vec<ScanPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
            }
        }
    }

    impl Store for ScriptedStore {
        fn get_field(&self, _key: &str, _field: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn list_fields(&self, _key: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }

        fn set_field(&self, _key: &str, _field: &str, _value: &str) -> Result<(), Error> {
            Ok(())
        }

        fn get_row(&self, _key: &str, _ttl_key: &str) -> Result<(Option<String>, i64), Error> {
            Ok((None, crate::store::NO_SUCH_KEY))
        }

        fn set_with_expiry(&self, _key: &str, _value: &str, _seconds: u32) -> Result<(), Error> {
            Ok(())
        }

        fn scan_keys(&self, _cursor: u64, _pattern: &str, _batch: usize) -> Result<ScanPage, Error> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(ScanPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }

        fn list_keys(&self, _pattern: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }

        fn size(&self) -> Result<i64, Error> {
            Ok(0)
        }
    }

    /// Scans fine but refuses to count keys.
    #[derive(Default)]
    struct HalfFailingStore {
        inner: MemoryStore,
    }

    impl Store for HalfFailingStore {
        fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
            self.inner.get_field(key, field)
        }

        fn list_fields(&self, key: &str) -> Result<Vec<String>, Error> {
            self.inner.list_fields(key)
        }

        fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), Error> {
            self.inner.set_field(key, field, value)
        }

        fn get_row(&self, key: &str, ttl_key: &str) -> Result<(Option<String>, i64), Error> {
            self.inner.get_row(key, ttl_key)
        }

        fn set_with_expiry(&self, key: &str, value: &str, seconds: u32) -> Result<(), Error> {
            self.inner.set_with_expiry(key, value, seconds)
        }

        fn scan_keys(&self, cursor: u64, pattern: &str, batch: usize) -> Result<ScanPage, Error> {
            self.inner.scan_keys(cursor, pattern, batch)
        }

        fn list_keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
            self.inner.list_keys(pattern)
        }

        fn size(&self) -> Result<i64, Error> {
            Err(Error::Backend {
                detail: "DBSIZE disabled".to_string(),
            })
        }
    }
}
