mod csv;
mod format;
mod json;
mod table;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use crate::cli::{Layout, SortOrder};
use crate::config::{OutputTarget, RunConfig};
use crate::core::{ReportAssembler, WideRow, WideTable};
use crate::error::AppError;

pub(crate) use self::csv::{write_long_csv, write_wide_csv};
pub(crate) use self::json::{long_json, wide_json, write_json};
pub(crate) use table::{SummaryOptions, render_summary};

/// Column name for a dimension: `ga:deviceCategory` → `deviceCategory`
pub(crate) fn dimension_header(name: &str) -> String {
    name.strip_prefix("ga:").unwrap_or(name).to_string()
}

/// Wide rows by domain, then period in the requested direction.
pub(crate) fn sorted_wide_rows(table: &WideTable, order: SortOrder) -> Vec<&WideRow> {
    let mut rows: Vec<&WideRow> = table.rows.iter().collect();
    rows.sort_by(|a, b| {
        let by_period = match order {
            SortOrder::Asc => a.period.cmp(&b.period),
            SortOrder::Desc => b.period.cmp(&a.period),
        };
        a.domain
            .cmp(&b.domain)
            .then(by_period)
            .then_with(|| a.dimensions.cmp(&b.dimensions))
    });
    rows
}

/// Write the assembled report in the configured layout and format.
pub(crate) fn write_report(run: &RunConfig, assembler: &ReportAssembler) -> Result<(), AppError> {
    match &run.output {
        OutputTarget::Stdout => write_to(io::stdout().lock(), run, assembler),
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            write_to(BufWriter::new(file), run, assembler)?;
            tracing::info!(path = %path.display(), rows = assembler.len(), "wrote report");
            Ok(())
        }
    }
}

fn write_to<W: Write>(
    out: W,
    run: &RunConfig,
    assembler: &ReportAssembler,
) -> Result<(), AppError> {
    let dimensions = &run.template.dimensions;
    match (run.json, run.layout) {
        (false, Layout::Long) => write_long_csv(out, assembler, dimensions, run.order),
        (false, Layout::Wide) => {
            let table = assembler.pivot_wide(&run.filters);
            write_wide_csv(out, &table, dimensions, run.order)
        }
        (true, Layout::Long) => write_json(out, &long_json(assembler, dimensions, run.order)),
        (true, Layout::Wide) => {
            let table = assembler.pivot_wide(&run.filters);
            write_json(out, &wide_json(&table, dimensions, run.order))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Granularity, Metric, Period, ReportRow};
    use crate::report::{FilterSpec, RequestTemplate};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn run(output: OutputTarget, layout: Layout, json: bool) -> RunConfig {
        RunConfig {
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 1, 31).unwrap(),
            granularity: Granularity::Month,
            filters: vec![FilterSpec::Total],
            template: RequestTemplate::default(),
            layout,
            order: SortOrder::Asc,
            json,
            output,
        }
    }

    fn assembler() -> ReportAssembler {
        let mut assembler =
            ReportAssembler::new(vec![Metric::new("ga:users"), Metric::new("ga:sessions")]);
        assembler
            .push(ReportRow {
                domain: "a.com".to_string(),
                view_id: "42".to_string(),
                period: Period {
                    start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2022, 1, 31).unwrap(),
                },
                filter: FilterSpec::Total,
                dimensions: Vec::new(),
                metrics: BTreeMap::from([
                    ("ga:users".to_string(), 7.0),
                    ("ga:sessions".to_string(), 9.0),
                ]),
            })
            .unwrap();
        assembler
    }

    #[test]
    fn dimension_header_strips_prefix() {
        assert_eq!(dimension_header("ga:deviceCategory"), "deviceCategory");
        assert_eq!(dimension_header("country"), "country");
    }

    #[test]
    fn writes_file_creating_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("jan.csv");
        write_report(&run(OutputTarget::File(path.clone()), Layout::Wide, false), &assembler())
            .unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "domain,view_id,period_start,period_end,total_users,total_sessions\n\
             a.com,42,2022-01-01,2022-01-31,7,9\n"
        );
    }

    #[test]
    fn json_file_is_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jan.json");
        write_report(&run(OutputTarget::File(path.clone()), Layout::Long, true), &assembler())
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["metrics"]["sessions"], 9);
    }
}
