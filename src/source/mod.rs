//! Row sources the archiver reads expired rows from and purges them in.
//!
//! Table names are interpolated into SQL text, so every name goes through
//! [`TableName::parse`] first: only plain identifiers (optionally schema
//! qualified) are accepted. They are emitted double-quoted after folding to
//! lower case, so `IoT_Data` names the same table it would unquoted.
//! The cutoff and row limit are bound parameters.

mod postgres;

use std::fmt;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::Error;

pub use postgres::PgSource;

/// Postgres truncates identifiers beyond this many bytes.
const MAX_IDENT_LEN: usize = 63;

/// A validated source table identifier, `table` or `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    name: String,
}

impl TableName {
    pub fn parse(value: &str) -> Result<Self, Error> {
        if value.is_empty() {
            return Err(Error::Config("empty table name".to_string()));
        }
        let mut parts = 0;
        for part in value.split('.') {
            validate_ident(value, part)?;
            parts += 1;
        }
        if parts > 2 {
            return Err(Error::Config(format!(
                "table name {value:?} has more than one schema qualifier"
            )));
        }
        Ok(Self {
            name: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Identifier form safe to splice into SQL text. Each part is folded to
    /// lower case, as Postgres does for unquoted identifiers.
    pub fn quoted(&self) -> String {
        self.name
            .split('.')
            .map(|part| format!("\"{}\"", part.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_ident(full: &str, part: &str) -> Result<(), Error> {
    let mut chars = part.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_start || !valid_rest {
        return Err(Error::Config(format!(
            "invalid table name {full:?}: identifiers must match [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    if part.len() > MAX_IDENT_LEN {
        return Err(Error::Config(format!(
            "invalid table name {full:?}: identifier longer than {MAX_IDENT_LEN} bytes"
        )));
    }
    Ok(())
}

/// A row as stored in a source table, before it is tagged with its table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub id: i64,
    pub timestamp: OffsetDateTime,
    pub device_id: String,
    pub value: f64,
}

#[async_trait]
pub trait RecordSource: Send {
    /// Rows with `timestamp < cutoff`, newest first, at most `limit` of them.
    async fn fetch_expired(
        &mut self,
        table: &TableName,
        cutoff: OffsetDateTime,
        limit: usize,
    ) -> anyhow::Result<Vec<SourceRow>>;

    /// Deletes every row with `timestamp < cutoff` and returns how many went.
    async fn purge_expired(
        &mut self,
        table: &TableName,
        cutoff: OffsetDateTime,
    ) -> anyhow::Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        assert_eq!(TableName::parse("iot_data").unwrap().as_str(), "iot_data");
        let qualified = TableName::parse("telemetry.Sensor_2024").unwrap();
        assert_eq!(qualified.quoted(), "\"telemetry\".\"sensor_2024\"");
    }

    #[test]
    fn mixed_case_names_fold_to_lower_case() {
        let name = TableName::parse("IoT_Data").unwrap();
        assert_eq!(name.quoted(), "\"iot_data\"");
        assert_eq!(name.as_str(), "IoT_Data");

        let qualified = TableName::parse("Telemetry.READINGS").unwrap();
        assert_eq!(qualified.quoted(), "\"telemetry\".\"readings\"");
    }

    #[test]
    fn quotes_single_identifier() {
        let name = TableName::parse("_raw").unwrap();
        assert_eq!(name.quoted(), "\"_raw\"");
        assert_eq!(name.to_string(), "_raw");
    }

    #[test]
    fn rejects_injection_attempts() {
        for bad in [
            "iot_data; DROP TABLE users",
            "iot_data--",
            "\"iot_data\"",
            "iot data",
            "1table",
            "a.b.c",
            ".iot",
            "iot.",
            "",
        ] {
            let err = TableName::parse(bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn rejects_overlong_identifier() {
        let name = "t".repeat(MAX_IDENT_LEN + 1);
        assert!(TableName::parse(&name).is_err());
        assert!(TableName::parse(&"t".repeat(MAX_IDENT_LEN)).is_ok());
    }
}
