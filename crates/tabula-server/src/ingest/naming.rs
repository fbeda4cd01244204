//! Backing-table and staged-file naming
//!
//! Backing tables are named `data_<millis>_<n>` where `<millis>` is the upload
//! time and `<n>` a random disambiguator in `0..1000`. The scheme is
//! probabilistic; collisions are detected by the provisioner, never resolved
//! by reusing a table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const TABLE_PREFIX: &str = "data_";

/// Upper bound (exclusive) of the random disambiguator
pub const DISAMBIGUATOR_RANGE: u16 = 1000;

/// Source of backing-table names
pub trait TableNamer: Send + Sync {
    fn next_name(&self) -> String;
}

/// Production namer: upload timestamp plus a random disambiguator
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampTableNamer;

impl TableNamer for TimestampTableNamer {
    fn next_name(&self) -> String {
        // UUID v4 bits are only an entropy source here
        let disambiguator = (Uuid::new_v4().as_u128() % u128::from(DISAMBIGUATOR_RANGE)) as u16;
        table_name_at(Utc::now(), disambiguator)
    }
}

/// Always returns the same name; used to force collisions
#[derive(Debug, Clone)]
pub struct FixedTableNamer(pub String);

impl TableNamer for FixedTableNamer {
    fn next_name(&self) -> String {
        self.0.clone()
    }
}

pub fn table_name_at(at: DateTime<Utc>, disambiguator: u16) -> String {
    format!("{TABLE_PREFIX}{}_{disambiguator}", at.timestamp_millis())
}

/// Whether `name` follows the backing-table pattern `data_<digits>_<digits>`
pub fn is_backing_table_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(TABLE_PREFIX) else {
        return false;
    };
    let mut parts = rest.split('_');
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(millis), Some(n), None) if all_digits(millis) && all_digits(n)
    )
}

/// Prefix of the staged upload file, e.g. `file-1700000000000-`
pub fn staged_file_prefix(at: DateTime<Utc>) -> String {
    format!("file-{}-", at.timestamp_millis())
}
