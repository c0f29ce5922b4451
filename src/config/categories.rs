//! Category reference table loading
//!
//! The vendor publishes its category codes as a spreadsheet. Exported to CSV,
//! each row carries a code column and a display-name column; every row becomes
//! one [`Category`] in file order.

use crate::state::Category;
use crate::ConfigError;
use std::path::Path;

/// Reads every (name, code) pair from a CSV reference table
///
/// Rows with an empty code are skipped. Missing columns are a validation error.
pub fn load_category_table(
    path: &Path,
    code_column: &str,
    name_column: &str,
) -> Result<Vec<Category>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Category table {} has no column '{}'",
                    path.display(),
                    column
                ))
            })
    };
    let code_idx = position(code_column)?;
    let name_idx = position(name_column)?;

    let mut categories = Vec::new();
    for row in reader.records() {
        let row = row?;
        let code = row.get(code_idx).unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }
        let name = row.get(name_idx).unwrap_or("").trim();
        categories.push(Category::new(name, code));
    }

    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_named_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(
            &path,
            "code,label\n010000,汽车服务\n,\n120000,商务住宅\n",
        )
        .unwrap();

        let categories = load_category_table(&path, "code", "label").unwrap();
        assert_eq!(
            categories,
            vec![
                Category::new("汽车服务", "010000"),
                Category::new("商务住宅", "120000"),
            ]
        );
    }

    #[test]
    fn test_missing_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(&path, "code\n010000\n").unwrap();

        let result = load_category_table(&path, "code", "label");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
