use std::io::Write;

use crate::cli::SortOrder;
use crate::core::{ReportAssembler, WideTable};
use crate::error::AppError;
use crate::output::format::format_value;
use crate::output::{dimension_header, sorted_wide_rows};
use crate::utils::format_date;

const KEY_COLUMNS: [&str; 4] = ["domain", "view_id", "period_start", "period_end"];

/// One row per domain, period, filter and dimension values.
pub(crate) fn write_long_csv<W: Write>(
    out: W,
    assembler: &ReportAssembler,
    dimensions: &[String],
    order: SortOrder,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<String> = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.push("filter".to_string());
    header.extend(dimensions.iter().map(|d| dimension_header(d)));
    header.extend(assembler.metrics().iter().map(|m| m.short_name().to_string()));
    writer.write_record(&header)?;

    for row in assembler.sorted(order) {
        let mut record = vec![
            row.domain.clone(),
            row.view_id.clone(),
            format_date(row.period.start),
            format_date(row.period.end),
            row.filter.name().to_string(),
        ];
        record.extend(row.dimensions.iter().cloned());
        record.extend(
            assembler
                .metrics()
                .iter()
                .map(|m| format_value(row.metric(&m.expression))),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// One row per domain and period, one `{filter}_{metric}` column per pair.
pub(crate) fn write_wide_csv<W: Write>(
    out: W,
    table: &WideTable,
    dimensions: &[String],
    order: SortOrder,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<String> = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(dimensions.iter().map(|d| dimension_header(d)));
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;

    for row in sorted_wide_rows(table, order) {
        let mut record = vec![
            row.domain.clone(),
            row.view_id.clone(),
            format_date(row.period.start),
            format_date(row.period.end),
        ];
        record.extend(row.dimensions.iter().cloned());
        record.extend(row.values.iter().map(|v| format_value(*v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
