use redis::ConnectionLike;
use std::time::Duration;

use super::{Error, ScanPage, Store};

/// Where the store gets its backend connections from.
///
/// The embedding server owns pooling policy; this crate only asks for a
/// connection per operation and hands it back by dropping it.  A pool
/// wrapper implements this by checking a connection out, the plain
/// [`ClientSource`] by dialling.
pub trait ConnectionSource: Send + Sync {
    type Conn: ConnectionLike;

    fn connection(&self) -> Result<Self::Conn, Error>;
}

/// A pool-free connection source that dials the backend for every
/// operation, with a bounded connect and read timeout.
pub struct ClientSource {
    client: redis::Client,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ClientSource {
    pub fn new(url: &str, connect_timeout: Duration, read_timeout: Duration) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|error| Error::Unavailable {
            detail: error.to_string(),
        })?;
        Ok(Self {
            client,
            connect_timeout,
            read_timeout,
        })
    }
}

impl ConnectionSource for ClientSource {
    type Conn = redis::Connection;

    fn connection(&self) -> Result<Self::Conn, Error> {
        let conn = self
            .client
            .get_connection_with_timeout(self.connect_timeout)
            .map_err(|error| Error::Unavailable {
                detail: error.to_string(),
            })?;
        conn.set_read_timeout(Some(self.read_timeout))
            .map_err(|error| Error::Unavailable {
                detail: error.to_string(),
            })?;
        Ok(conn)
    }
}

/// A [`Store`] over a Redis backend.
pub struct RedisStore<S> {
    source: S,
}

impl<S: ConnectionSource> RedisStore<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn run<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, Error> {
        let mut conn = self.source.connection()?;
        cmd.query(&mut conn).map_err(backend_error)
    }
}

fn backend_error(error: redis::RedisError) -> Error {
    if error.is_connection_refusal() || error.is_timeout() || error.is_connection_dropped() {
        Error::Unavailable {
            detail: error.to_string(),
        }
    } else {
        Error::Backend {
            detail: error.to_string(),
        }
    }
}

impl<S: ConnectionSource> Store for RedisStore<S> {
    fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        self.run(redis::cmd("HGET").arg(key).arg(field))
    }

    fn list_fields(&self, key: &str) -> Result<Vec<String>, Error> {
        self.run(redis::cmd("HKEYS").arg(key))
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), Error> {
        self.run(redis::cmd("HSET").arg(key).arg(field).arg(value))
    }

    fn get_row(&self, key: &str, ttl_key: &str) -> Result<(Option<String>, i64), Error> {
        let mut conn = self.source.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("GET")
            .arg(key)
            .cmd("TTL")
            .arg(ttl_key);
        pipe.query(&mut conn).map_err(backend_error)
    }

    fn set_with_expiry(&self, key: &str, value: &str, seconds: u32) -> Result<(), Error> {
        self.run(redis::cmd("SETEX").arg(key).arg(seconds).arg(value))
    }

    fn scan_keys(&self, cursor: u64, pattern: &str, batch: usize) -> Result<ScanPage, Error> {
        let (cursor, keys) = self.run(
            redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(batch),
        )?;
        Ok(ScanPage { cursor, keys })
    }

    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        self.run(redis::cmd("KEYS").arg(pattern))
    }

    fn size(&self) -> Result<i64, Error> {
        self.run(&redis::cmd("DBSIZE"))
    }
}
