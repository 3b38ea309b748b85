pub mod rows;
pub mod synth;
pub mod ttl;

pub use self::synth::{synthesise, Synthesis};
pub use self::ttl::{TtlClamp, DEFAULT_TTL};

use std::fmt;

use crate::records::{self, decode_record, Record, RecordType, ResourceRecord, ANSWER_TYPES};
use crate::store::{self, KeySchema, Store};
use crate::zone::{Zone, APEX_LABEL};

/// The outcome of a lookup.  An existing name with no records of the
/// requested type still answers, just emptily; only a name that does
/// not exist in the zone at all is a [`Lookup::NoMatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Answer {
        answers: Vec<ResourceRecord>,
        extras: Vec<ResourceRecord>,
    },
    NoMatch,
}

/// An error that can occur answering a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Store(store::Error),
    Decode(records::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Store(error) => write!(f, "{error}"),
            Error::Decode(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(error) => Some(error),
            Error::Decode(error) => Some(error),
        }
    }
}

impl From<store::Error> for Error {
    fn from(error: store::Error) -> Self {
        Error::Store(error)
    }
}

impl From<records::Error> for Error {
    fn from(error: records::Error) -> Self {
        Error::Decode(error)
    }
}

/// The query engine over the aggregated backend layout: loads zones,
/// resolves names to locations, and synthesises answer and glue
/// RRsets.  Every call re-reads the backend, so answers are never
/// staler than the store.
pub struct Resolver<S> {
    store: S,
    schema: KeySchema,
    clamp: TtlClamp,
}

impl<S: Store> Resolver<S> {
    pub fn new(store: S, schema: KeySchema, clamp: TtlClamp) -> Self {
        Self {
            store,
            schema,
            clamp,
        }
    }

    /// Load a zone's location set from the backend.  A zone with no
    /// hash at all loads as an empty zone rather than an error.
    pub fn load_zone(&self, zone_name: &str) -> Result<Zone, Error> {
        let key = self.schema.zone_key(zone_name);
        let locations = self.store.list_fields(&key)?;
        Ok(Zone::new(zone_name, locations))
    }

    /// Answer a query for one type at one name within a zone.
    pub fn lookup(&self, zone: &Zone, qname: &str, rtype: RecordType) -> Result<Lookup, Error> {
        let location = match zone.find_location(qname) {
            Some(location) => location,
            None => return Ok(Lookup::NoMatch),
        };

        let record = self.fetch(zone, &location)?;
        let synthesis = synthesise(rtype, qname, zone.name(), &record, self.clamp);

        let mut extras = Vec::new();
        for host in &synthesis.glue_hosts {
            extras.extend(self.host_records(zone, host)?);
        }

        Ok(Lookup::Answer {
            answers: synthesis.answers,
            extras,
        })
    }

    /// Every record in the zone, framed by its SOA: the SOA leads, all
    /// locations' RRsets and their glue follow, and the same SOA closes
    /// the sequence.
    ///
    /// A location whose stored value does not decode is logged and
    /// skipped; a backend failure aborts the transfer.
    pub fn zone_transfer(&self, zone: &Zone) -> Result<Vec<ResourceRecord>, Error> {
        let apex = self.fetch(zone, APEX_LABEL)?;
        let soa = synthesise(RecordType::SOA, zone.name(), zone.name(), &apex, self.clamp);

        let mut records = soa.answers.clone();
        let mut extras = Vec::new();

        let mut locations = self.zone_locations(zone)?;
        locations.sort();

        for location in locations {
            let name = owner_name(zone, &location);
            let record = match self.fetch(zone, &location) {
                Ok(record) => record,
                Err(Error::Decode(error)) => {
                    tracing::warn!(%location, %error, "skipping undecodable location in zone transfer");
                    continue;
                }
                Err(error) => return Err(error),
            };

            for rtype in ANSWER_TYPES {
                let synthesis = synthesise(rtype, &name, zone.name(), &record, self.clamp);
                records.extend(synthesis.answers);
                for host in &synthesis.glue_hosts {
                    extras.extend(self.host_records(zone, host)?);
                }
            }
        }

        records.extend(extras);
        records.extend(soa.answers);
        Ok(records)
    }

    /// Write one location's record value, as already-encoded JSON.
    pub fn save(&self, zone_name: &str, location: &str, value: &str) -> Result<(), Error> {
        let key = self.schema.zone_key(zone_name);
        self.store.set_field(&key, location, value)?;
        Ok(())
    }

    /// Address and alias records for a glue hostname, if it lives in
    /// this zone.  Glue is one level deep: a CNAME target's own
    /// addresses are not chased.
    fn host_records(&self, zone: &Zone, host: &str) -> Result<Vec<ResourceRecord>, Error> {
        let location = match zone.find_location(host) {
            Some(location) => location,
            None => return Ok(Vec::new()),
        };
        let record = self.fetch(zone, &location)?;

        let mut out = Vec::new();
        for rtype in [RecordType::A, RecordType::AAAA, RecordType::CNAME] {
            out.extend(synthesise(rtype, host, zone.name(), &record, self.clamp).answers);
        }
        Ok(out)
    }

    /// Fetch and decode one location's record.  An absent field is an
    /// empty record, so lookups on it answer emptily.
    fn fetch(&self, zone: &Zone, location: &str) -> Result<Record, Error> {
        let key = self.schema.zone_key(zone.name());
        match self.store.get_field(&key, location)? {
            Some(raw) => Ok(decode_record(&key, &raw)?),
            None => Ok(Record::default()),
        }
    }

    fn zone_locations(&self, zone: &Zone) -> Result<Vec<String>, Error> {
        let key = self.schema.zone_key(zone.name());
        Ok(self.store.list_fields(&key)?)
    }
}

fn owner_name(zone: &Zone, location: &str) -> String {
    if location == APEX_LABEL {
        zone.name().to_string()
    } else {
        format!("{}.{}", location, zone.name())
    }
}
