use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum length of a single DNS character-string, and so of a single
/// TXT chunk.  See section 3.3 of RFC 1035.
pub const TXT_CHUNK_LEN: usize = 255;

/// Ensure a name is fully qualified by appending the trailing dot if it
/// is missing.
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Whether a name is fully qualified.
pub fn is_fqdn(name: &str) -> bool {
    name.ends_with('.')
}

/// The aggregated on-backend record layout: one JSON value per label,
/// decoding to a bag of typed lists.  Every field is optional, and
/// sub-records with empty or null required fields are skipped during
/// synthesis rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub a: Vec<ARecord>,
    #[serde(default)]
    pub aaaa: Vec<AaaaRecord>,
    #[serde(default)]
    pub cname: Vec<CnameRecord>,
    #[serde(default)]
    pub txt: Vec<TxtRecord>,
    #[serde(default)]
    pub ns: Vec<NsRecord>,
    #[serde(default)]
    pub mx: Vec<MxRecord>,
    #[serde(default)]
    pub srv: Vec<SrvRecord>,
    #[serde(default)]
    pub caa: Vec<CaaRecord>,
    #[serde(default)]
    pub soa: Option<SoaRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ARecord {
    /// Null and unparsable addresses decode to `None` and are skipped
    /// during synthesis, not treated as errors.
    #[serde(default, deserialize_with = "lenient_ipv4")]
    pub ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AaaaRecord {
    #[serde(default, deserialize_with = "lenient_ipv6")]
    pub ip: Option<Ipv6Addr>,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CnameRecord {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxtRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NsRecord {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MxRecord {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub preference: u16,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SrvRecord {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub priority: u16,
    #[serde(default)]
    pub weight: u16,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CaaRecord {
    #[serde(default)]
    pub flag: u8,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SoaRecord {
    #[serde(default)]
    pub ns: String,
    #[serde(default)]
    pub mbox: String,
    #[serde(default)]
    pub refresh: u32,
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub expire: u32,
    #[serde(default)]
    pub minttl: u32,
    #[serde(default)]
    pub ttl: u32,
}

impl SoaRecord {
    /// A stored SOA with an empty primary nameserver counts as absent:
    /// the synthesizer falls back to placeholder data.
    pub fn is_configured(&self) -> bool {
        !self.ns.is_empty()
    }
}

fn lenient_ipv4<'de, D>(deserializer: D) -> Result<Option<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Ipv4Addr::from_str(&s).ok()))
}

fn lenient_ipv6<'de, D>(deserializer: D) -> Result<Option<Ipv6Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| Ipv6Addr::from_str(&s).ok()))
}

/// The record types this engine can synthesise answers for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    TXT,
    NS,
    MX,
    SRV,
    CAA,
    SOA,
}

/// All types except SOA, in the order a zone transfer emits them.
pub const ANSWER_TYPES: [RecordType; 8] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::TXT,
    RecordType::NS,
    RecordType::MX,
    RecordType::SRV,
    RecordType::CAA,
];

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::NS => write!(f, "NS"),
            RecordType::MX => write!(f, "MX"),
            RecordType::SRV => write!(f, "SRV"),
            RecordType::CAA => write!(f, "CAA"),
            RecordType::SOA => write!(f, "SOA"),
        }
    }
}

impl FromStr for RecordType {
    type Err = RecordTypeFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::AAAA),
            "CNAME" => Ok(RecordType::CNAME),
            "TXT" => Ok(RecordType::TXT),
            "NS" => Ok(RecordType::NS),
            "MX" => Ok(RecordType::MX),
            "SRV" => Ok(RecordType::SRV),
            "CAA" => Ok(RecordType::CAA),
            "SOA" => Ok(RecordType::SOA),
            _ => Err(RecordTypeFromStr::NoParse),
        }
    }
}

/// Errors that can arise when converting a `&str` into a `RecordType`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeFromStr {
    NoParse,
}

impl fmt::Display for RecordTypeFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to record type")
    }
}

impl std::error::Error for RecordTypeFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A synthesised resource record, ready for the dispatcher to put on
/// the wire.  Names are fully-qualified dotted strings; the wire codec
/// lives with the dispatcher, not here.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ResourceRecord {
    pub name: String,
    pub data: RData,
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RecordType {
        self.data.rtype()
    }
}

/// A record type with its associated, synthesised, data.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RData {
    A {
        address: Ipv4Addr,
    },
    AAAA {
        address: Ipv6Addr,
    },
    CNAME {
        cname: String,
    },
    /// One or more character-string chunks of at most [`TXT_CHUNK_LEN`]
    /// octets each.
    TXT {
        chunks: Vec<Bytes>,
    },
    NS {
        nsdname: String,
    },
    MX {
        preference: u16,
        exchange: String,
    },
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    CAA {
        flag: u8,
        tag: String,
        value: String,
    },
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
}

impl RData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RData::A { .. } => RecordType::A,
            RData::AAAA { .. } => RecordType::AAAA,
            RData::CNAME { .. } => RecordType::CNAME,
            RData::TXT { .. } => RecordType::TXT,
            RData::NS { .. } => RecordType::NS,
            RData::MX { .. } => RecordType::MX,
            RData::SRV { .. } => RecordType::SRV,
            RData::CAA { .. } => RecordType::CAA,
            RData::SOA { .. } => RecordType::SOA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqdn_appends_missing_dot() {
        assert_eq!("example.com.", fqdn("example.com"));
        assert_eq!("example.com.", fqdn("example.com."));
    }

    #[test]
    fn recordtype_string_roundtrip() {
        for rtype in [
            RecordType::A,
            RecordType::AAAA,
            RecordType::CNAME,
            RecordType::TXT,
            RecordType::NS,
            RecordType::MX,
            RecordType::SRV,
            RecordType::CAA,
            RecordType::SOA,
        ] {
            assert_eq!(Ok(rtype), RecordType::from_str(&rtype.to_string()));
        }
    }

    #[test]
    fn soa_with_empty_ns_is_unconfigured() {
        assert!(!SoaRecord::default().is_configured());
        assert!(SoaRecord {
            ns: "ns1.example.com.".to_string(),
            ..SoaRecord::default()
        }
        .is_configured());
    }
}
