use serde::Deserialize;
use std::path::PathBuf;

use crate::core::Identifier;
use crate::error::AppError;
use crate::source::IdentifierSource;

/// A CSV file with a `domain,view_id` header
pub(crate) struct CsvIdentifiers {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    domain: String,
    #[serde(alias = "viewId", alias = "view")]
    view_id: String,
}

impl CsvIdentifiers {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn error(&self, e: csv::Error) -> AppError {
        AppError::Identifiers(format!("{}: {e}", self.path.display()))
    }
}

impl IdentifierSource for CsvIdentifiers {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn fetch(&self) -> Result<Vec<Identifier>, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(&self.path)
            .map_err(|e| self.error(e))?;

        reader
            .deserialize::<CsvRecord>()
            .map(|record| {
                let record = record.map_err(|e| self.error(e))?;
                Ok(Identifier::new(record.domain, record.view_id))
            })
            .collect()
    }
}
