use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::records::*;
use crate::resolver::ttl::TtlClamp;

/// Fixed timer fields for a placeholder SOA, when the zone has no
/// stored SOA data.
const PLACEHOLDER_REFRESH: u32 = 86400;
const PLACEHOLDER_RETRY: u32 = 7200;
const PLACEHOLDER_EXPIRE: u32 = 3600;

/// The outcome of synthesising one RRset: the answers themselves, plus
/// the hostnames that want glue looked up for the extra section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub answers: Vec<ResourceRecord>,
    pub glue_hosts: Vec<String>,
}

/// Synthesise the RRset of one type at one name from a decoded
/// [`Record`].
///
/// Sub-records with missing required data (a null or unparsable
/// address, an empty hostname or text) are skipped, not errors.  SOA
/// answers are named at the zone apex whatever the queried name, and
/// fall back to placeholder data when the zone has none stored.
pub fn synthesise(
    rtype: RecordType,
    name: &str,
    zone: &str,
    record: &Record,
    clamp: TtlClamp,
) -> Synthesis {
    let name = fqdn(name);
    match rtype {
        RecordType::A => a(&name, record, clamp),
        RecordType::AAAA => aaaa(&name, record, clamp),
        RecordType::CNAME => cname(&name, record, clamp),
        RecordType::TXT => txt(&name, record, clamp),
        RecordType::NS => ns(&name, record, clamp),
        RecordType::MX => mx(&name, record, clamp),
        RecordType::SRV => srv(&name, record, clamp),
        RecordType::CAA => caa(&name, record, clamp),
        RecordType::SOA => soa(zone, record, clamp),
    }
}

fn a(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.a {
        if let Some(address) = sub.ip {
            out.answers.push(ResourceRecord {
                name: name.to_string(),
                data: RData::A { address },
                ttl: clamp.effective(sub.ttl),
            });
        }
    }
    out
}

fn aaaa(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.aaaa {
        if let Some(address) = sub.ip {
            out.answers.push(ResourceRecord {
                name: name.to_string(),
                data: RData::AAAA { address },
                ttl: clamp.effective(sub.ttl),
            });
        }
    }
    out
}

fn cname(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.cname {
        if sub.host.is_empty() {
            continue;
        }
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::CNAME {
                cname: fqdn(&sub.host),
            },
            ttl: clamp.effective(sub.ttl),
        });
    }
    out
}

fn txt(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.txt {
        if sub.text.is_empty() {
            continue;
        }
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::TXT {
                chunks: split_chunks(&sub.text),
            },
            ttl: clamp.effective(sub.ttl),
        });
    }
    out
}

fn ns(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.ns {
        if sub.host.is_empty() {
            continue;
        }
        let host = fqdn(&sub.host);
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::NS {
                nsdname: host.clone(),
            },
            ttl: clamp.effective(sub.ttl),
        });
        out.glue_hosts.push(host);
    }
    out
}

fn mx(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.mx {
        if sub.host.is_empty() {
            continue;
        }
        let host = fqdn(&sub.host);
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::MX {
                preference: sub.preference,
                exchange: host.clone(),
            },
            ttl: clamp.effective(sub.ttl),
        });
        out.glue_hosts.push(host);
    }
    out
}

fn srv(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.srv {
        if sub.target.is_empty() {
            continue;
        }
        let target = fqdn(&sub.target);
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::SRV {
                priority: sub.priority,
                weight: sub.weight,
                port: sub.port,
                target: target.clone(),
            },
            ttl: clamp.effective(sub.ttl),
        });
        out.glue_hosts.push(target);
    }
    out
}

fn caa(name: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    for sub in &record.caa {
        if sub.tag.is_empty() || sub.value.is_empty() {
            continue;
        }
        out.answers.push(ResourceRecord {
            name: name.to_string(),
            data: RData::CAA {
                flag: sub.flag,
                tag: sub.tag.clone(),
                value: sub.value.clone(),
            },
            ttl: clamp.effective(0),
        });
    }
    out
}

fn soa(zone: &str, record: &Record, clamp: TtlClamp) -> Synthesis {
    let mut out = Synthesis::default();
    let zone = fqdn(zone);
    let answer = match &record.soa {
        Some(stored) if stored.is_configured() => ResourceRecord {
            name: zone.clone(),
            data: RData::SOA {
                mname: fqdn(&stored.ns),
                rname: fqdn(&stored.mbox),
                serial: serial(),
                refresh: stored.refresh,
                retry: stored.retry,
                expire: stored.expire,
                minimum: stored.minttl,
            },
            ttl: clamp.effective(stored.ttl),
        },
        _ => ResourceRecord {
            name: zone.clone(),
            data: RData::SOA {
                mname: format!("ns1.{zone}"),
                rname: format!("hostmaster.{zone}"),
                serial: serial(),
                refresh: PLACEHOLDER_REFRESH,
                retry: PLACEHOLDER_RETRY,
                expire: PLACEHOLDER_EXPIRE,
                minimum: clamp.zone_ttl(),
            },
            ttl: clamp.zone_ttl(),
        },
    };
    out.answers.push(answer);
    out
}

/// The current Unix timestamp, which doubles as the SOA serial so the
/// value is always fresh without any stored change counter.
fn serial() -> u32 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u32::try_from(since_epoch.as_secs()).unwrap_or(u32::MAX)
}

/// Split text into DNS character-string chunks of at most
/// [`TXT_CHUNK_LEN`] octets.  A length that is an exact multiple does
/// not grow a trailing empty chunk.
fn split_chunks(text: &str) -> Vec<Bytes> {
    text.as_bytes()
        .chunks(TXT_CHUNK_LEN)
        .map(Bytes::copy_from_slice)
        .collect()
}
