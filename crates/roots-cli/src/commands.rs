//! Command implementations for the `roots` binary

use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use roots_connection::{ConnectionManager, HealthStatus, ping_database};
use roots_core::{ColumnMeta, QueryResult, Value};
use std::io::Write;

/// Probe the warehouse and report latency
pub async fn ping(manager: &ConnectionManager, out: &mut impl Write) -> Result<()> {
    let handle = manager.get_connection().await?;
    let latency = ping_database(&*handle, manager.config().probe_timeout())
        .await
        .context("warehouse answered the first probe but not the second")?;
    let status = HealthStatus::from_latency(latency);

    writeln!(
        out,
        "{} connection #{}: {} ({} ms)",
        manager.driver_name(),
        handle.id(),
        status,
        latency.as_millis()
    )?;
    Ok(())
}

pub async fn query(
    manager: &ConnectionManager,
    sql: &str,
    params: &[String],
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let params = bind_params(params);
    let result = manager.execute(sql, &params).await?;

    if json {
        let rows: Vec<_> = result.rows.iter().map(|row| row.to_map()).collect();
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out)?;
    } else if result.has_rows() {
        writeln!(out, "{}", render_result(&result))?;
        writeln!(out, "({} rows, {} ms)", result.row_count(), result.execution_time_ms)?;
    } else {
        writeln!(out, "No data for this selection.")?;
    }
    Ok(())
}

pub async fn exec(
    manager: &ConnectionManager,
    sql: &str,
    params: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let params = bind_params(params);
    let affected = manager.execute_update(sql, &params).await?;
    writeln!(out, "{affected} row(s) affected")?;
    Ok(())
}

pub async fn table_exists(manager: &ConnectionManager, name: &str, out: &mut impl Write) -> Result<()> {
    let exists = manager.catalog().table_exists(name).await?;
    writeln!(out, "{name}: {}", if exists { "exists" } else { "not found" })?;
    Ok(())
}

pub async fn describe_table(manager: &ConnectionManager, name: &str, out: &mut impl Write) -> Result<()> {
    let columns = manager.catalog().table_schema(name).await?;
    if columns.is_empty() {
        writeln!(out, "{name}: not found")?;
    } else {
        writeln!(out, "{}", render_columns(&columns))?;
    }
    Ok(())
}

pub async fn drop_table(manager: &ConnectionManager, name: &str, out: &mut impl Write) -> Result<()> {
    manager.catalog().drop_table_if_exists(name).await?;
    writeln!(out, "{name}: dropped (if it existed)")?;
    Ok(())
}

/// Command-line parameters are bound as text; the warehouse coerces them
fn bind_params(params: &[String]) -> Vec<Value> {
    params.iter().map(|p| Value::from(p.as_str())).collect()
}

pub fn render_result(result: &QueryResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(result.columns.iter().map(|c| c.name.as_str()));
    for row in &result.rows {
        table.add_row(row.values.iter().map(cell));
    }
    table
}

pub fn render_columns(columns: &[ColumnMeta]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "column", "type", "nullable", "length", "precision", "scale"]);
    let optional = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
    for column in columns {
        table.add_row([
            (column.ordinal + 1).to_string(),
            column.name.clone(),
            column.data_type.clone(),
            if column.nullable { "yes" } else { "no" }.to_string(),
            optional(column.max_length),
            optional(column.precision.map(i64::from)),
            optional(column.scale.map(i64::from)),
        ]);
    }
    table
}

fn cell(value: &Value) -> String {
    if value.is_null() {
        "NULL".to_string()
    } else {
        value.to_string()
    }
}
