use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::records::types::*;

/// Decode a hash field's value, as stored under the aggregated layout,
/// into a [`Record`].
///
/// # Errors
///
/// `Error::Decode` on malformed JSON, logged with the offending key.
pub fn decode_record(key: &str, raw: &str) -> Result<Record, Error> {
    match serde_json::from_str(raw) {
        Ok(record) => Ok(record),
        Err(error) => {
            tracing::warn!(%key, %error, "JSON-decoding error for stored record");
            Err(Error::Decode {
                key: key.to_string(),
                detail: error.to_string(),
            })
        }
    }
}

/// A decoded per-type row.  Only these three kinds exist under the
/// per-type layout; anything else stored there is a data error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    A {
        ttl: u32,
        addresses: Vec<Ipv4Addr>,
    },
    Ns {
        ttl: u32,
        hosts: Vec<String>,
    },
    Soa {
        ttl: u32,
        ns: String,
        mbox: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minttl: u32,
    },
}

impl Row {
    /// The row's own TTL field, used to seed the decay countdown on
    /// first synthesis.
    pub fn ttl(&self) -> u32 {
        match self {
            Row::A { ttl, .. } | Row::Ns { ttl, .. } | Row::Soa { ttl, .. } => *ttl,
        }
    }
}

/// Decode a per-type text row: whitespace-separated fields
/// `[ttl, class, type, data...]`.
///
/// The class field is carried but not checked.  The type field must
/// equal the requested type.  Unparsable A addresses are skipped, like
/// null addresses in the aggregated layout; an SOA mbox that is not
/// fully qualified is qualified against the zone name.
pub fn decode_row(key: &str, rtype: RecordType, zone: &str, raw: &str) -> Result<Row, Error> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(Error::MalformedRow {
            row: raw.to_string(),
        });
    }

    let ttl = match fields[0].parse::<u32>() {
        Ok(ttl) => ttl,
        Err(_) => {
            return Err(Error::Decode {
                key: key.to_string(),
                detail: format!("non-numeric TTL '{}'", fields[0]),
            })
        }
    };

    if RecordType::from_str(fields[2]) != Ok(rtype) {
        return Err(Error::TypeMismatch {
            expected: rtype,
            found: fields[2].to_string(),
        });
    }

    let data = &fields[3..];
    match rtype {
        RecordType::A => {
            let mut addresses = Vec::with_capacity(data.len());
            for value in data {
                match Ipv4Addr::from_str(value) {
                    Ok(address) => addresses.push(address),
                    Err(_) => {
                        tracing::warn!(%key, %value, "skipping unparsable address in A row");
                    }
                }
            }
            Ok(Row::A { ttl, addresses })
        }
        RecordType::NS => {
            let mut hosts = Vec::with_capacity(data.len());
            for value in data {
                if !is_fqdn(value) {
                    return Err(Error::NotFullyQualified {
                        host: (*value).to_string(),
                    });
                }
                hosts.push((*value).to_string());
            }
            Ok(Row::Ns { ttl, hosts })
        }
        RecordType::SOA => {
            if data.len() != 7 {
                return Err(Error::MalformedRow {
                    row: raw.to_string(),
                });
            }

            let mbox = if is_fqdn(data[1]) {
                data[1].to_string()
            } else {
                format!("{}.{}", data[1], fqdn(zone))
            };

            Ok(Row::Soa {
                ttl,
                ns: data[0].to_string(),
                mbox,
                serial: parse_u32(key, data[2])?,
                refresh: parse_u32(key, data[3])?,
                retry: parse_u32(key, data[4])?,
                expire: parse_u32(key, data[5])?,
                minttl: parse_u32(key, data[6])?,
            })
        }
        _ => Err(Error::UnsupportedType { rtype }),
    }
}

fn parse_u32(key: &str, digits: &str) -> Result<u32, Error> {
    match digits.parse::<u32>() {
        Ok(n) => Ok(n),
        Err(_) => Err(Error::Decode {
            key: key.to_string(),
            detail: format!("expected u32, got '{digits}'"),
        }),
    }
}

/// An error that can occur decoding stored record data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The stored value does not match the expected shape.
    Decode { key: String, detail: String },
    /// A per-type row with fewer than four fields, or an SOA row
    /// without exactly seven data fields.
    MalformedRow { row: String },
    /// A row's type field does not equal the requested type.
    TypeMismatch { expected: RecordType, found: String },
    /// The per-type layout only stores A, NS, and SOA rows.
    UnsupportedType { rtype: RecordType },
    /// A stored hostname violates the fully-qualified-name
    /// precondition.
    NotFullyQualified { host: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Decode { key, detail } => {
                write!(f, "could not decode value for key '{key}': {detail}")
            }
            Error::MalformedRow { row } => write!(f, "malformed row '{row}'"),
            Error::TypeMismatch { expected, found } => {
                write!(f, "row type '{found}' does not match requested '{expected}'")
            }
            Error::UnsupportedType { rtype } => {
                write!(f, "record type '{rtype}' not supported by the row layout")
            }
            Error::NotFullyQualified { host } => {
                write!(f, "stored hostname '{host}' is not fully qualified")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_record_full() {
        let raw = r#"{
            "a": [{"ip": "1.2.3.4", "ttl": 300}],
            "aaaa": [{"ip": "::1"}],
            "cname": [{"host": "target.example.com.", "ttl": 60}],
            "txt": [{"text": "hello"}],
            "ns": [{"host": "ns1.example.com."}],
            "mx": [{"host": "mail.example.com.", "preference": 10}],
            "srv": [{"target": "sip.example.com.", "priority": 1, "weight": 5, "port": 5060}],
            "caa": [{"flag": 0, "tag": "issue", "value": "letsencrypt.org"}],
            "soa": {"ns": "ns1.example.com.", "mbox": "hostmaster.example.com.",
                    "refresh": 44, "retry": 55, "expire": 66, "minttl": 100, "ttl": 30}
        }"#;
        let record = decode_record("example.com.", raw).unwrap();

        assert_eq!(Some(Ipv4Addr::new(1, 2, 3, 4)), record.a[0].ip);
        assert_eq!(300, record.a[0].ttl);
        assert_eq!("target.example.com.", record.cname[0].host);
        assert_eq!(10, record.mx[0].preference);
        assert_eq!(5060, record.srv[0].port);
        assert_eq!("issue", record.caa[0].tag);
        assert!(record.soa.unwrap().is_configured());
    }

    #[test]
    fn decode_record_malformed_json() {
        assert!(matches!(
            decode_record("example.com.", "{not json"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn decode_record_null_address_skipped_not_error() {
        let record = decode_record("x", r#"{"a": [{"ip": null}, {"ip": "bogus"}]}"#).unwrap();
        assert_eq!(vec![None, None], record.a.iter().map(|a| a.ip).collect::<Vec<_>>());
    }

    #[test]
    fn decode_row_a() {
        let row = decode_row("k", RecordType::A, "example.com.", "300 IN A 1.1.1.1 2.2.2.2");
        assert_eq!(
            Ok(Row::A {
                ttl: 300,
                addresses: vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2)],
            }),
            row
        );
    }

    #[test]
    fn decode_row_a_skips_unparsable_addresses() {
        let row = decode_row("k", RecordType::A, "example.com.", "300 IN A nope 2.2.2.2");
        assert_eq!(
            Ok(Row::A {
                ttl: 300,
                addresses: vec![Ipv4Addr::new(2, 2, 2, 2)],
            }),
            row
        );
    }

    #[test]
    fn decode_row_too_few_fields() {
        assert!(matches!(
            decode_row("k", RecordType::A, "example.com.", "300 IN A"),
            Err(Error::MalformedRow { .. })
        ));
    }

    #[test]
    fn decode_row_non_numeric_ttl() {
        assert!(matches!(
            decode_row("k", RecordType::A, "example.com.", "soon IN A 1.1.1.1"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn decode_row_type_mismatch() {
        assert_eq!(
            Err(Error::TypeMismatch {
                expected: RecordType::A,
                found: "NS".to_string(),
            }),
            decode_row("k", RecordType::A, "example.com.", "300 IN NS ns1.example.com.")
        );
    }

    #[test]
    fn decode_row_ns_requires_fully_qualified_hosts() {
        assert_eq!(
            Err(Error::NotFullyQualified {
                host: "ns1.example.com".to_string(),
            }),
            decode_row("k", RecordType::NS, "example.com.", "300 IN NS ns1.example.com")
        );
    }

    #[test]
    fn decode_row_soa() {
        let row = decode_row(
            "k",
            RecordType::SOA,
            "example.com.",
            "300 IN SOA ns1.example.com. hostmaster 7 44 55 66 100",
        );
        assert_eq!(
            Ok(Row::Soa {
                ttl: 300,
                ns: "ns1.example.com.".to_string(),
                mbox: "hostmaster.example.com.".to_string(),
                serial: 7,
                refresh: 44,
                retry: 55,
                expire: 66,
                minttl: 100,
            }),
            row
        );
    }

    #[test]
    fn decode_row_soa_wrong_arity() {
        assert!(matches!(
            decode_row("k", RecordType::SOA, "example.com.", "300 IN SOA ns1. hostmaster 7"),
            Err(Error::MalformedRow { .. })
        ));
    }

    #[test]
    fn decode_row_unsupported_type() {
        assert_eq!(
            Err(Error::UnsupportedType {
                rtype: RecordType::TXT,
            }),
            decode_row("k", RecordType::TXT, "example.com.", "300 IN TXT hello")
        );
    }
}
