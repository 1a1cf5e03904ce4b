use crate::error::Result;
use toml::Value;

/// Dependency locations in `pyproject.toml`, highest priority first.
const DEPENDENCY_TABLES: &[&[&str]] = &[
    // PEP 621
    &["project", "dependencies"],
    // Poetry
    &["tool", "poetry", "dependencies"],
    // Flit (legacy metadata)
    &["tool", "flit", "metadata", "requires"],
];

/// Poetry lists the interpreter constraint alongside real packages.
const RUNTIME_KEY: &str = "python";

/// Extracts declarations from a `pyproject.toml`.
///
/// Returns `Ok(None)` when none of the known locations holds a non-empty
/// table or array, so the caller can fall back to `requirements.txt`.
///
/// # Errors
///
/// Returns an error if the content is not valid TOML.
pub fn parse_pyproject(content: &str) -> Result<Option<Vec<String>>> {
    let doc: Value = toml::from_str(content)?;

    for path in DEPENDENCY_TABLES {
        let found = path
            .iter()
            .try_fold(&doc, |node, key| node.as_table().and_then(|t| t.get(*key)));

        match found {
            Some(Value::Table(table)) if !table.is_empty() => {
                return Ok(Some(
                    table
                        .keys()
                        .filter(|k| k.as_str() != RUNTIME_KEY)
                        .cloned()
                        .collect(),
                ));
            }
            Some(Value::Array(items)) if !items.is_empty() => {
                let deps = items
                    .iter()
                    .filter_map(|item| match item.as_str() {
                        Some(s) => Some(s.to_string()),
                        None => {
                            tracing::warn!(item = %item, "ignoring non-string dependency entry");
                            None
                        }
                    })
                    .collect();
                return Ok(Some(deps));
            }
            _ => continue,
        }
    }

    Ok(None)
}

/// One declaration per non-blank line that is not a `#` comment.
pub fn parse_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
