//! Query construction for the reporting API

mod filter;
mod request;

pub(crate) use filter::{FilterSpec, parse_filters};
pub(crate) use request::{ReportRequest, RequestTemplate, build_request};
