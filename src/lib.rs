//! An authoritative DNS answer-synthesis engine over zone data stored in
//! Redis, rather than static zone files.
//!
//! The crate is organised around the path a single query takes:
//!
//! - the [`catalog`] keeps an atomically-swapped snapshot of the zones the
//!   backend currently holds, which the embedding server consults to decide
//!   whether a query is ours to answer at all;
//!
//! - the [`zone`] module maps a query name to the zone-internal location
//!   that should answer it, including RFC 4592-style wildcard synthesis;
//!
//! - the [`resolver`] reads that location's data through the [`store`],
//!   decodes it with the [`records`] codec, and synthesises typed answer and
//!   glue RRsets with the configured TTL policy.
//!
//! Every query re-reads the backend: there is no cache, so answers are
//! always as fresh as the store.  Request dispatch, the wire codec, and
//! connection-pool construction are the embedding server's concern; this
//! crate only consumes a connection source and produces RRsets.

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod catalog;
pub mod records;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod zone;
