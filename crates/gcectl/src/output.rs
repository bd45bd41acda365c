use anyhow::{Context, Result};
use comfy_table::Table;
use jpx_core::Runtime;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::cli;

/// Global JMESPath runtime with extended functions
static JMESPATH_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or initialize the JMESPath runtime with extended functions
pub fn get_jmespath_runtime() -> &'static Runtime {
    JMESPATH_RUNTIME.get_or_init(|| Runtime::builder().with_all_extensions().build())
}

/// Normalize backtick literals in JMESPath expressions.
///
/// JMESPath allows elided quotes in backtick literals, so `` `foo` `` means
/// `` `"foo"` ``. The runtime requires valid JSON inside backticks, so bare
/// strings are quoted here; numbers, booleans, null and quoted strings are
/// left untouched.
fn normalize_backtick_literals(query: &str) -> String {
    static BACKTICK_RE: OnceLock<Regex> = OnceLock::new();
    let re = BACKTICK_RE.get_or_init(|| {
        Regex::new(r"`([^`\\]*(?:\\.[^`\\]*)*)`").expect("backtick pattern is valid")
    });

    re.replace_all(query, |caps: &regex::Captures| {
        let content = &caps[1];
        let trimmed = content.trim();

        if serde_json::from_str::<Value>(trimmed).is_ok() {
            format!("`{}`", content)
        } else {
            let escaped = trimmed.replace('\\', "\\\\").replace('"', "\\\"");
            format!("`\"{}\"`", escaped)
        }
    })
    .into_owned()
}

/// Compile a JMESPath expression using the extended runtime.
pub fn compile_jmespath(
    query: &str,
) -> Result<jpx_core::Expression<'static>, jpx_core::JmespathError> {
    let normalized = normalize_backtick_literals(query);
    get_jmespath_runtime().compile(&normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Table,
}

impl OutputFormat {
    /// Resolve the CLI flag, using `auto` for whatever suits the command
    pub fn resolve(flag: cli::OutputFormat, auto: OutputFormat) -> Self {
        match flag {
            cli::OutputFormat::Auto => auto,
            cli::OutputFormat::Json => Self::Json,
            cli::OutputFormat::Yaml => Self::Yaml,
            cli::OutputFormat::Table => Self::Table,
        }
    }
}

pub fn print_output<T: Serialize>(
    data: T,
    format: OutputFormat,
    query: Option<&str>,
) -> Result<()> {
    let json_value = apply_query(serde_json::to_value(data)?, query)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json_value)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&json_value)?);
        }
        OutputFormat::Table => {
            print_as_table(&json_value)?;
        }
    }

    Ok(())
}

/// Apply an optional JMESPath query
pub fn apply_query(value: Value, query: Option<&str>) -> Result<Value> {
    match query {
        Some(query_str) => {
            let expr = compile_jmespath(query_str)
                .with_context(|| format!("Invalid JMESPath expression: {}", query_str))?;
            expr.search(&value).context("JMESPath query failed")
        }
        None => Ok(value),
    }
}

fn print_as_table(value: &Value) -> Result<()> {
    match value {
        Value::Array(rows) if !rows.is_empty() => println!("{}", rows_table(rows)),
        Value::Object(fields) => {
            let mut table = Table::new();
            table.set_header(["Field", "Value"]);
            for (key, val) in fields {
                table.add_row([key.clone(), format_value(val)]);
            }
            println!("{table}");
        }
        scalar => println!("{}", format_value(scalar)),
    }
    Ok(())
}

/// One row per element; columns are the union of object keys in first-seen order
fn rows_table(rows: &[Value]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        if let Value::Object(fields) = row {
            for key in fields.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
    }

    let mut table = Table::new();
    if columns.is_empty() {
        table.set_header(["Value"]);
        for row in rows {
            table.add_row([format_value(row)]);
        }
        return table;
    }

    table.set_header(columns.clone());
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| row.get(*col).map_or_else(String::new, format_value))
            .collect();
        table.add_row(cells);
    }
    table
}

/// Render a JSON value as a single table cell
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_backtick_unquoted_string() {
        assert_eq!(
            normalize_backtick_literals(r#"[?status==`RUNNING`]"#),
            r#"[?status==`"RUNNING"`]"#
        );
    }

    #[test]
    fn test_normalize_backtick_json_literals_untouched() {
        assert_eq!(
            normalize_backtick_literals(r#"[?name==`"web-1"`]"#),
            r#"[?name==`"web-1"`]"#
        );
        assert_eq!(
            normalize_backtick_literals(r#"[?targetSize==`3`]"#),
            r#"[?targetSize==`3`]"#
        );
        assert_eq!(
            normalize_backtick_literals(r#"[?canIpForward==`false`]"#),
            r#"[?canIpForward==`false`]"#
        );
    }

    #[test]
    fn test_normalize_multiple_backticks() {
        assert_eq!(
            normalize_backtick_literals(r#"[?status==`RUNNING` && zone==`z1`]"#),
            r#"[?status==`"RUNNING"` && zone==`"z1"`]"#
        );
    }

    #[test]
    fn test_apply_query_filters_instances() {
        let instances = json!([
            {"name": "web-1", "status": "RUNNING"},
            {"name": "web-2", "status": "TERMINATED"}
        ]);
        let names = apply_query(instances, Some("[?status==`RUNNING`].name")).unwrap();
        assert_eq!(names, json!(["web-1"]));
    }

    #[test]
    fn test_invalid_query_is_an_error() {
        assert!(apply_query(json!({}), Some("[?")).is_err());
    }

    #[test]
    fn test_rows_table_unions_columns() {
        let rows = vec![json!({"name": "a"}), json!({"name": "b", "zone": "z1"})];
        let rendered = rows_table(&rows).to_string();
        assert!(rendered.contains("zone"));
        assert!(rendered.contains("z1"));
    }

    #[test]
    fn test_format_value_cells() {
        assert_eq!(format_value(&Value::Null), "-");
        assert_eq!(format_value(&json!(3)), "3");
        assert_eq!(format_value(&json!(["a", "b"])), "[2 items]");
    }

    #[test]
    fn test_resolve_auto() {
        assert_eq!(
            OutputFormat::resolve(cli::OutputFormat::Auto, OutputFormat::Table),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::resolve(cli::OutputFormat::Yaml, OutputFormat::Table),
            OutputFormat::Yaml
        );
    }
}
