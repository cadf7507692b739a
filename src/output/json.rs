use serde_json::{Map, Value, json};
use std::io::Write;

use crate::cli::SortOrder;
use crate::core::{ReportAssembler, WideTable};
use crate::error::AppError;
use crate::output::{dimension_header, sorted_wide_rows};
use crate::utils::format_date;

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub(crate) fn long_json(
    assembler: &ReportAssembler,
    dimensions: &[String],
    order: SortOrder,
) -> Value {
    let rows: Vec<Value> = assembler
        .sorted(order)
        .into_iter()
        .map(|row| {
            let mut obj = Map::new();
            obj.insert("domain".into(), json!(row.domain));
            obj.insert("view_id".into(), json!(row.view_id));
            obj.insert("period_start".into(), json!(format_date(row.period.start)));
            obj.insert("period_end".into(), json!(format_date(row.period.end)));
            obj.insert("filter".into(), json!(row.filter));
            if !dimensions.is_empty() {
                let dims: Map<String, Value> = dimensions
                    .iter()
                    .zip(&row.dimensions)
                    .map(|(name, value)| (dimension_header(name), json!(value)))
                    .collect();
                obj.insert("dimensions".into(), Value::Object(dims));
            }
            let metrics: Map<String, Value> = assembler
                .metrics()
                .iter()
                .map(|m| (m.short_name().to_string(), number(row.metric(&m.expression))))
                .collect();
            obj.insert("metrics".into(), Value::Object(metrics));
            Value::Object(obj)
        })
        .collect();
    Value::Array(rows)
}

pub(crate) fn wide_json(table: &WideTable, dimensions: &[String], order: SortOrder) -> Value {
    let rows: Vec<Value> = sorted_wide_rows(table, order)
        .into_iter()
        .map(|row| {
            let mut obj = Map::new();
            obj.insert("domain".into(), json!(row.domain));
            obj.insert("view_id".into(), json!(row.view_id));
            obj.insert("period_start".into(), json!(format_date(row.period.start)));
            obj.insert("period_end".into(), json!(format_date(row.period.end)));
            for (name, value) in dimensions.iter().zip(&row.dimensions) {
                obj.insert(dimension_header(name), json!(value));
            }
            for (column, value) in table.columns.iter().zip(&row.values) {
                obj.insert(column.clone(), number(*value));
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(rows)
}

pub(crate) fn write_json<W: Write>(mut out: W, value: &Value) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
