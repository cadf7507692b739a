//! Core module - date partitioning, row types and assembly

mod assembler;
mod period;
mod types;

pub(crate) use assembler::{ReportAssembler, WideRow, WideTable};
pub(crate) use period::partition;
pub(crate) use types::{Granularity, Identifier, Metric, Period, SkippedQuery};

#[cfg(test)]
pub(crate) use types::ReportRow;
