//! JSON record input and output
//!
//! Input is a JSON array of objects; output is the same array, pretty printed,
//! with `images` attached. Key order is preserved end to end.

use std::io::{Read, Write};

use serde_json::Value;

use canopy_common::{Error, Result};

use crate::models::SourceRecord;

/// Parse a JSON array of record objects
pub fn read_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>> {
    let value: Value = serde_json::from_reader(reader)?;
    parse_records(value)
}

pub fn parse_records(value: Value) -> Result<Vec<SourceRecord>> {
    let Value::Array(items) = value else {
        return Err(Error::InvalidInput("expected a JSON array of records".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            SourceRecord::from_value(item)
                .map_err(|e| Error::InvalidInput(format!("record {}: {}", index, e)))
        })
        .collect()
}

/// Write records as pretty JSON followed by a newline
pub fn write_records<W: Write>(mut writer: W, records: &[SourceRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
