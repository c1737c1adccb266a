//! Загрузка CSV с наблюдениями

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, TrafficError};
use crate::types::TrafficRecord;

pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<TrafficRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    tracing::info!("Loading records from {}", path.display());
    read_records(file)
}

/// Любая битая строка прерывает загрузку
pub fn read_records<R: Read>(reader: R) -> Result<Vec<TrafficRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: TrafficRecord = result?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(TrafficError::DataError("No records in CSV".to_string()));
    }

    tracing::debug!("Loaded {} records", records.len());
    Ok(records)
}
