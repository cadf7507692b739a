//! Identifier sources
//!
//! Each backend (CSV file, config list, BigQuery) implements `IdentifierSource`
//! to hand the run loop its list of (domain, view id) pairs.

pub(crate) mod bigquery;
pub(crate) mod csv_file;
pub(crate) mod static_list;

use std::collections::{HashMap, HashSet};

use crate::core::Identifier;
use crate::error::AppError;

pub(crate) use bigquery::BigQueryIdentifiers;
pub(crate) use csv_file::CsvIdentifiers;
pub(crate) use static_list::StaticIdentifiers;

pub(crate) trait IdentifierSource {
    /// Short label for logs and errors
    fn name(&self) -> &'static str;

    /// Fetch the raw pairs; `load_identifiers` cleans them up
    fn fetch(&self) -> Result<Vec<Identifier>, AppError>;
}

/// Box type for dynamic dispatch
pub(crate) type BoxedSource<'a> = Box<dyn IdentifierSource + 'a>;

/// Load, trim and validate identifiers. Repeated pairs are kept once; a
/// domain mapped to two different views is an error.
pub(crate) fn load_identifiers(source: &dyn IdentifierSource) -> Result<Vec<Identifier>, AppError> {
    let raw = source.fetch()?;
    let mut seen = HashSet::new();
    let mut identifiers = Vec::with_capacity(raw.len());

    for (i, id) in raw.into_iter().enumerate() {
        let id = Identifier::new(id.domain.trim(), id.view_id.trim());
        if id.domain.is_empty() || id.view_id.is_empty() {
            return Err(AppError::Identifiers(format!(
                "{} entry {} has an empty domain or view id",
                source.name(),
                i + 1
            )));
        }
        if seen.insert((id.domain.clone(), id.view_id.clone())) {
            identifiers.push(id);
        } else {
            tracing::debug!(
                domain = %id.domain,
                view_id = %id.view_id,
                "duplicate identifier ignored"
            );
        }
    }

    if identifiers.is_empty() {
        return Err(AppError::Identifiers(format!(
            "{} returned no views",
            source.name()
        )));
    }
    check_unique_domains(&identifiers)?;

    tracing::info!(source = source.name(), count = identifiers.len(), "loaded identifiers");
    Ok(identifiers)
}

/// Rows are keyed by domain, so each domain may name only one view.
pub(crate) fn check_unique_domains(identifiers: &[Identifier]) -> Result<(), AppError> {
    let mut views: HashMap<&str, &str> = HashMap::new();
    for id in identifiers {
        if let Some(first) = views.insert(&id.domain, &id.view_id)
            && first != id.view_id
        {
            return Err(AppError::Identifiers(format!(
                "domain {} maps to more than one view ({first} and {})",
                id.domain, id.view_id
            )));
        }
    }
    Ok(())
}
