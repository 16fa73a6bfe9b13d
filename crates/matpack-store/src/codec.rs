//! Payload encode/decode and integrity checksums.
//!
//! Numeric arrays are bincode-encoded, tables are CSV with a header row,
//! and JSON metadata is compact `serde_json`. Each persisted resource
//! records a `crc32:XXXXXXXX` checksum of its bytes so loads can verify
//! file integrity when asked to.

use std::io::Write;

use matpack_types::{ArrayData, Scalar, Table};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::traits::StorageBackend;

/// Encode a numeric array payload.
pub fn encode_array(data: &ArrayData) -> StoreResult<Vec<u8>> {
    bincode::serialize(data).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode a numeric array payload.
pub fn decode_array(bytes: &[u8]) -> StoreResult<ArrayData> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Encode a table as CSV with a header row.
pub fn encode_table(table: &Table) -> StoreResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(Scalar::to_cell).collect();
        writer
            .write_record(&cells)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode CSV bytes into a table, inferring cell types per column value.
pub fn decode_table(bytes: &[u8]) -> StoreResult<Table> {
    let mut reader = csv::Reader::from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| StoreError::Codec(e.to_string()))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StoreError::Codec(e.to_string()))?;
        rows.push(record.iter().map(Scalar::parse_cell).collect());
    }
    Table::new(columns, rows).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Encode a JSON metadata value.
pub fn encode_json(value: &Value) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode a JSON metadata value.
pub fn decode_json(bytes: &[u8]) -> StoreResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

/// CRC32 checksum of a byte buffer, formatted as `crc32:XXXXXXXX`.
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    format!("crc32:{:08x}", hasher.finalize())
}

/// Write a fully-encoded payload to the backend at `path`.
pub fn write_resource(
    backend: &mut dyn StorageBackend,
    path: &str,
    bytes: &[u8],
) -> StoreResult<()> {
    let mut writer = backend.open_for_write(path)?;
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
