//! The fixed set of traffic segments a report can be cut by

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

const ORGANIC_CHANNEL: &str = "Organic Search";
const BLOG_PATH_PATTERN: &str = "blog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum FilterSpec {
    /// Every session in the view
    Total,
    /// Sessions from the "Organic Search" channel grouping
    Organic,
    /// Sessions whose landing page is not a blog page
    NonBlog,
    /// Organic sessions that did not land on a blog page
    OrganicNonBlog,
}

impl FilterSpec {
    pub(crate) const ALL: [FilterSpec; 4] = [
        FilterSpec::Total,
        FilterSpec::Organic,
        FilterSpec::NonBlog,
        FilterSpec::OrganicNonBlog,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            FilterSpec::Total => "total",
            FilterSpec::Organic => "organic",
            FilterSpec::NonBlog => "non_blog",
            FilterSpec::OrganicNonBlog => "organic_non_blog",
        }
    }

    /// The `dimensionFilterClauses` value for this segment.
    pub(crate) fn clauses(self) -> Vec<FilterClause> {
        match self {
            FilterSpec::Total => Vec::new(),
            FilterSpec::Organic => vec![FilterClause {
                operator: None,
                filters: vec![organic_channel()],
            }],
            FilterSpec::NonBlog => vec![FilterClause {
                operator: None,
                filters: vec![exclude_blog_landing()],
            }],
            FilterSpec::OrganicNonBlog => vec![FilterClause {
                operator: Some(ClauseOperator::And),
                filters: vec![organic_channel(), exclude_blog_landing()],
            }],
        }
    }

    fn known_names() -> String {
        Self::ALL
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for FilterSpec {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '+'], "_");
        match normalized.as_str() {
            "total" | "all" => Ok(FilterSpec::Total),
            "organic" => Ok(FilterSpec::Organic),
            "non_blog" | "blog" => Ok(FilterSpec::NonBlog),
            "organic_non_blog" | "organic_blog" => Ok(FilterSpec::OrganicNonBlog),
            _ => Err(AppError::UnknownFilter {
                name: s.trim().to_string(),
                known: Self::known_names(),
            }),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for FilterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Parse a list of names, rejecting unknown ones and dropping repeats.
pub(crate) fn parse_filters<S: AsRef<str>>(names: &[S]) -> Result<Vec<FilterSpec>, AppError> {
    let mut filters = Vec::with_capacity(names.len());
    for name in names {
        let filter: FilterSpec = name.as_ref().parse()?;
        if !filters.contains(&filter) {
            filters.push(filter);
        }
    }
    if filters.is_empty() {
        return Ok(FilterSpec::ALL.to_vec());
    }
    Ok(filters)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FilterClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) operator: Option<ClauseOperator>,
    pub(crate) filters: Vec<DimensionFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum ClauseOperator {
    And,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DimensionFilter {
    pub(crate) dimension_name: String,
    pub(crate) operator: MatchOperator,
    pub(crate) expressions: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) not: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum MatchOperator {
    Exact,
    Regexp,
}

fn organic_channel() -> DimensionFilter {
    DimensionFilter {
        dimension_name: "ga:channelGrouping".to_string(),
        operator: MatchOperator::Exact,
        expressions: vec![ORGANIC_CHANNEL.to_string()],
        not: false,
    }
}

fn exclude_blog_landing() -> DimensionFilter {
    DimensionFilter {
        dimension_name: "ga:landingPagePath".to_string(),
        operator: MatchOperator::Regexp,
        expressions: vec![BLOG_PATH_PATTERN.to_string()],
        not: true,
    }
}
