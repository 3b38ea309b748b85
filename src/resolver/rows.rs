use crate::records::{decode_row, RData, RecordType, ResourceRecord, Row};
use crate::records::fqdn;
use crate::resolver::{Error, Lookup};
use crate::store::{KeySchema, Store, NO_SUCH_KEY};

/// The query engine over the per-type row layout, where each name and
/// type pair lives under its own plain key and TTLs decay in the
/// backend itself.
///
/// Next to each row sits a companion key whose remaining lifetime is
/// the answer's TTL.  The first synthesis after the companion expires
/// (or before it ever existed) re-arms it from the row's own TTL
/// field, so a record answers with a countdown that resets each time
/// it runs out.
pub struct RowResolver<S> {
    store: S,
    schema: KeySchema,
}

impl<S: Store> RowResolver<S> {
    pub fn new(store: S, schema: KeySchema) -> Self {
        Self { store, schema }
    }

    /// Answer a query for one type at one name.  Only A, NS, and SOA
    /// exist under this layout; anything else is an
    /// [`crate::records::Error::UnsupportedType`] error.
    pub fn lookup(&self, name: &str, rtype: RecordType) -> Result<Lookup, Error> {
        let (row, ttl) = match self.fetch_row(name, rtype)? {
            Some(found) => found,
            None => return Ok(Lookup::NoMatch),
        };

        let name = fqdn(name);
        match row {
            Row::A { addresses, .. } => Ok(Lookup::Answer {
                answers: addresses
                    .into_iter()
                    .map(|address| ResourceRecord {
                        name: name.clone(),
                        data: RData::A { address },
                        ttl,
                    })
                    .collect(),
                extras: Vec::new(),
            }),
            Row::Ns { hosts, .. } => {
                let mut extras = Vec::new();
                for host in &hosts {
                    extras.extend(self.host_addresses(host)?);
                }
                Ok(Lookup::Answer {
                    answers: hosts
                        .into_iter()
                        .map(|nsdname| ResourceRecord {
                            name: name.clone(),
                            data: RData::NS { nsdname },
                            ttl,
                        })
                        .collect(),
                    extras,
                })
            }
            Row::Soa {
                ns,
                mbox,
                serial,
                refresh,
                retry,
                expire,
                minttl,
                ..
            } => Ok(Lookup::Answer {
                answers: vec![ResourceRecord {
                    name: name.clone(),
                    data: RData::SOA {
                        mname: ns,
                        rname: mbox,
                        serial,
                        refresh,
                        retry,
                        expire,
                        minimum: minttl,
                    },
                    ttl,
                }],
                extras: Vec::new(),
            }),
        }
    }

    /// Fetch and decode one row together with its effective TTL under
    /// the decay policy.  `None` means no such row.
    pub fn fetch_row(&self, name: &str, rtype: RecordType) -> Result<Option<(Row, u32)>, Error> {
        let key = self.schema.row_key(rtype, name);
        let ttl_key = self.schema.row_ttl_key(rtype, name);

        let (value, remaining) = self.store.get_row(&key, &ttl_key)?;
        let raw = match value {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let row = decode_row(&key, rtype, name, &raw)?;

        let ttl = if remaining == NO_SUCH_KEY {
            let initial = row.ttl();
            if initial > 0 {
                self.store
                    .set_with_expiry(&ttl_key, &initial.to_string(), initial)?;
            }
            initial
        } else {
            u32::try_from(remaining.max(0)).unwrap_or(0)
        };

        Ok(Some((row, ttl)))
    }

    // One level of glue, from the A row at the nameserver's own name.
    fn host_addresses(&self, host: &str) -> Result<Vec<ResourceRecord>, Error> {
        match self.fetch_row(host, RecordType::A)? {
            Some((Row::A { addresses, .. }, ttl)) => Ok(addresses
                .into_iter()
                .map(|address| ResourceRecord {
                    name: fqdn(host),
                    data: RData::A { address },
                    ttl,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}
