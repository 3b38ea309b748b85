pub mod decode;
pub mod types;

pub use self::decode::{decode_record, decode_row, Error, Row};
pub use self::types::*;
