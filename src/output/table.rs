use comfy_table::{Cell, Color};
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::core::{ReportAssembler, SkippedQuery};
use crate::output::format::{create_styled_table, format_number, header_cell, right_cell};
use crate::report::FilterSpec;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SummaryOptions<'a> {
    pub(crate) use_color: bool,
    pub(crate) queries: usize,
    pub(crate) skipped: &'a [SkippedQuery],
    pub(crate) elapsed_ms: Option<f64>,
}

/// Per-domain totals across the whole range. Metrics that cannot be summed
/// across periods show as `n/a`. Skipped queries are listed after the status
/// line, since the wide layout shows them as zeros.
pub(crate) fn render_summary(
    assembler: &ReportAssembler,
    filters: &[FilterSpec],
    opts: SummaryOptions<'_>,
) -> String {
    let c = opts.use_color;
    let mut out = String::new();

    if !assembler.is_empty() {
        let mut table = create_styled_table();
        let mut header = vec![
            header_cell("Domain", c),
            header_cell("Filter", c),
            header_cell("Periods", c),
        ];
        header.extend(assembler.metrics().iter().map(|m| header_cell(m.short_name(), c)));
        table.set_header(header);

        let domains: BTreeSet<&str> = assembler.rows().iter().map(|r| r.domain.as_str()).collect();
        let dim = if c { Some(Color::DarkGrey) } else { None };

        for domain in domains {
            for (i, &filter) in filters.iter().enumerate() {
                let periods: BTreeSet<_> = assembler
                    .rows()
                    .iter()
                    .filter(|r| r.domain == domain && r.filter == filter)
                    .map(|r| r.period)
                    .collect();

                let mut row = vec![
                    Cell::new(if i == 0 { domain } else { "" }),
                    Cell::new(filter.name()),
                    right_cell(&periods.len().to_string(), None, false),
                ];
                for metric in assembler.metrics() {
                    let cell = match assembler.total(domain, filter, metric) {
                        Ok(total) => right_cell(&format_number(total), None, false),
                        Err(_) => right_cell("n/a", dim, false),
                    };
                    row.push(cell);
                }
                table.add_row(row);
            }
        }
        let _ = writeln!(out, "{table}");
    }

    let status = format!(
        "{} rows from {} queries ({} skipped)",
        assembler.len(),
        opts.queries,
        opts.skipped.len()
    );
    let status = if !opts.skipped.is_empty() && c {
        format!("\x1b[33m{status}\x1b[0m")
    } else {
        status
    };
    match opts.elapsed_ms {
        Some(ms) if c => {
            let _ = write!(out, "\n  {status} | \x1b[36m{ms:.0}ms\x1b[0m\n");
        }
        Some(ms) => {
            let _ = write!(out, "\n  {status} | {ms:.0}ms\n");
        }
        None => {
            let _ = write!(out, "\n  {status}\n");
        }
    }
    for query in opts.skipped {
        let _ = writeln!(
            out,
            "  skipped {} ({}) {} {}: {}",
            query.domain, query.view_id, query.period, query.filter, query.reason
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Metric, Period, ReportRow};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn month(m: u32, last: u32) -> Period {
        Period {
            start: NaiveDate::from_ymd_opt(2022, m, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, m, last).unwrap(),
        }
    }

    fn assembler() -> ReportAssembler {
        let mut assembler =
            ReportAssembler::new(vec![Metric::new("ga:users"), Metric::new("ga:sessions")]);
        for (period, sessions) in [(month(1, 31), 1200.0), (month(2, 28), 800.0)] {
            assembler
                .push(ReportRow {
                    domain: "a.com".to_string(),
                    view_id: "42".to_string(),
                    period,
                    filter: FilterSpec::Total,
                    dimensions: Vec::new(),
                    metrics: BTreeMap::from([
                        ("ga:users".to_string(), 100.0),
                        ("ga:sessions".to_string(), sessions),
                    ]),
                })
                .unwrap();
        }
        assembler
    }

    fn skipped() -> Vec<SkippedQuery> {
        vec![SkippedQuery {
            domain: "a.com".to_string(),
            view_id: "42".to_string(),
            period: month(3, 31),
            filter: FilterSpec::Organic,
            reason: "HTTP 429: RESOURCE_EXHAUSTED".to_string(),
        }]
    }

    fn opts(skipped: &[SkippedQuery]) -> SummaryOptions<'_> {
        SummaryOptions {
            use_color: false,
            queries: 3,
            skipped,
            elapsed_ms: Some(42.0),
        }
    }

    #[test]
    fn sums_additive_and_hides_non_additive() {
        let text = render_summary(&assembler(), &[FilterSpec::Total], opts(&[]));
        assert!(text.contains("2,000"));
        assert!(text.contains("n/a"));
    }

    #[test]
    fn status_line_reports_skips_and_timing() {
        let skipped = skipped();
        let text = render_summary(&assembler(), &[FilterSpec::Total], opts(&skipped));
        assert!(text.contains("2 rows from 3 queries (1 skipped) | 42ms"));
    }

    #[test]
    fn skipped_queries_are_listed() {
        let skipped = skipped();
        let text = render_summary(&assembler(), &[FilterSpec::Total], opts(&skipped));
        assert!(text.contains(
            "skipped a.com (42) 2022-03-01..2022-03-31 organic: HTTP 429: RESOURCE_EXHAUSTED"
        ));

        let clean = render_summary(&assembler(), &[FilterSpec::Total], opts(&[]));
        assert!(!clean.contains("skipped a.com"));
    }

    #[test]
    fn empty_report_prints_status_only() {
        let empty = ReportAssembler::new(vec![Metric::new("ga:sessions")]);
        let text = render_summary(&empty, &FilterSpec::ALL, opts(&[]));
        assert!(!text.contains("Domain"));
        assert!(text.contains("0 rows from 3 queries"));
    }
}
