pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{ClientSource, ConnectionSource, RedisStore};

use std::fmt;

use crate::records::RecordType;

/// The sentinel the backend returns when asked for the remaining
/// lifetime of a key that does not exist.
pub const NO_SUCH_KEY: i64 = -2;

/// One page of a cursor scan over the backend keyspace.  A returned
/// cursor of zero means the scan is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// The key-value operations the query engine needs from its backend.
///
/// Implementations must be usable from multiple request-handling tasks
/// at once.  All operations are a single round trip, except
/// [`Store::get_row`] which pairs the value fetch with its TTL probe
/// atomically so the decay policy never sees a value from one moment
/// and a lifetime from another.
pub trait Store: Send + Sync {
    /// Fetch one field of a hash, `None` if the hash or field is
    /// absent.
    fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, Error>;

    /// All field names of a hash, empty if the hash is absent.
    fn list_fields(&self, key: &str) -> Result<Vec<String>, Error>;

    /// Set one field of a hash.
    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), Error>;

    /// Fetch a plain key's value together with the remaining lifetime
    /// of its companion TTL key, in one atomic step.  The lifetime is
    /// [`NO_SUCH_KEY`] when the TTL key is absent.
    fn get_row(&self, key: &str, ttl_key: &str) -> Result<(Option<String>, i64), Error>;

    /// Set a plain key to expire after `seconds`.
    fn set_with_expiry(&self, key: &str, value: &str, seconds: u32) -> Result<(), Error>;

    /// One page of a cursor scan for keys matching `pattern`.
    fn scan_keys(&self, cursor: u64, pattern: &str, batch: usize) -> Result<ScanPage, Error>;

    /// All keys matching `pattern` in one round trip.  Only suitable
    /// for small keyspaces; zone discovery prefers [`Store::scan_keys`].
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, Error>;

    /// Total number of keys in the backend database.
    fn size(&self) -> Result<i64, Error>;
}

/// An error that can occur talking to the backend.
///
/// Details are carried as strings so errors stay cheap to clone and
/// compare in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Could not reach the backend at all.
    Unavailable { detail: String },
    /// The backend answered, but with a failure.
    Backend { detail: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Unavailable { detail } => write!(f, "backend unavailable: {detail}"),
            Error::Backend { detail } => write!(f, "backend error: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// How zone and row keys are laid out in the backend keyspace: a fixed
/// prefix and suffix wrapped around the meaningful middle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    pub prefix: String,
    pub suffix: String,
}

impl KeySchema {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// The hash key holding a whole zone under the aggregated layout.
    pub fn zone_key(&self, zone: &str) -> String {
        format!("{}{}{}", self.prefix, zone, self.suffix)
    }

    /// The key of a single typed row under the per-type layout.
    pub fn row_key(&self, rtype: RecordType, name: &str) -> String {
        format!("{}{}/{}{}", self.prefix, rtype, name, self.suffix)
    }

    /// The companion key holding a row's decaying lifetime.
    pub fn row_ttl_key(&self, rtype: RecordType, name: &str) -> String {
        format!("{}{}/{}:ttl{}", self.prefix, rtype, name, self.suffix)
    }

    /// The match pattern covering every key under this schema.
    pub fn pattern(&self) -> String {
        format!("{}*{}", self.prefix, self.suffix)
    }

    /// Strip the prefix and suffix from a raw backend key, yielding the
    /// meaningful middle.  Keys that do not carry both wrappers are
    /// returned unchanged, matching how discovery treats foreign keys.
    pub fn strip<'a>(&self, key: &'a str) -> &'a str {
        match key.strip_prefix(&self.prefix) {
            Some(rest) => match rest.strip_suffix(&self.suffix) {
                Some(middle) => middle,
                None => key,
            },
            None => key,
        }
    }
}
