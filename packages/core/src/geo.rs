//! Zip code to coordinate lookup.
//!
//! Loaded from a CSV with the columns `zip,latitude,longitude,state_code`.
//! Only California zip codes are served since MyTurn only covers that state.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::discovery::Coordinates;

pub const SUPPORTED_STATE: &str = "CA";

#[derive(Error, Debug)]
pub enum ZipError {
    #[error("Could not load zip code table: {0}")]
    Load(#[from] csv::Error),

    #[error("Zip code must be a 5 digit number, got '{0}'")]
    Malformed(String),

    #[error("Zip code {0} doesn't exist")]
    Unknown(String),

    #[error("Zip code {0} has no known coordinates")]
    MissingCoordinates(String),

    #[error("Zip code {zip} is in {state}, not California")]
    OutOfState { zip: String, state: String },
}

#[derive(Debug, Deserialize)]
struct ZipRecord {
    zip: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    state_code: Option<String>,
}

#[derive(Debug, Clone)]
struct ZipEntry {
    latitude: Option<f64>,
    longitude: Option<f64>,
    state_code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ZipTable {
    entries: HashMap<String, ZipEntry>,
}

impl ZipTable {
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, ZipError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::from_csv_reader(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ZipError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, ZipError> {
        let mut entries = HashMap::new();
        for record in reader.deserialize::<ZipRecord>() {
            let record = record?;
            entries.insert(
                record.zip,
                ZipEntry {
                    latitude: record.latitude,
                    longitude: record.longitude,
                    state_code: record.state_code,
                },
            );
        }

        tracing::debug!("Loaded {} zip code(s)", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coordinates for a California zip code.
    pub fn resolve(&self, zip: &str) -> Result<Coordinates, ZipError> {
        let zip = zip.trim();
        if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
            return Err(ZipError::Malformed(zip.to_string()));
        }

        let entry = self
            .entries
            .get(zip)
            .ok_or_else(|| ZipError::Unknown(zip.to_string()))?;

        let (Some(latitude), Some(longitude)) = (entry.latitude, entry.longitude) else {
            return Err(ZipError::MissingCoordinates(zip.to_string()));
        };

        match entry.state_code.as_deref() {
            Some(SUPPORTED_STATE) => Ok(Coordinates::new(latitude, longitude)),
            Some(state) => Err(ZipError::OutOfState {
                zip: zip.to_string(),
                state: state.to_string(),
            }),
            None => Err(ZipError::Unknown(zip.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = "\
zip,latitude,longitude,state_code
94612,37.8085,-122.2669,CA
10001,40.7484,-73.9967,NY
96799,,,CA
";

    fn table() -> ZipTable {
        ZipTable::from_reader(TABLE.as_bytes()).unwrap()
    }

    #[test]
    fn resolves_california_zip() {
        let coordinates = table().resolve("94612").unwrap();
        assert_eq!(coordinates, Coordinates::new(37.8085, -122.2669));
    }

    #[test]
    fn rejects_out_of_state_zip() {
        assert!(matches!(
            table().resolve("10001"),
            Err(ZipError::OutOfState { ref state, .. }) if state == "NY"
        ));
    }

    #[test]
    fn rejects_zip_without_coordinates() {
        assert!(matches!(table().resolve("96799"), Err(ZipError::MissingCoordinates(_))));
    }

    #[test]
    fn rejects_unknown_and_malformed_zips() {
        assert!(matches!(table().resolve("90210"), Err(ZipError::Unknown(_))));
        assert!(matches!(table().resolve("9461"), Err(ZipError::Malformed(_))));
        assert!(matches!(table().resolve("abcde"), Err(ZipError::Malformed(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();

        let table = ZipTable::from_csv(file.path()).unwrap();

        assert_eq!(table.len(), 3);
    }
}
