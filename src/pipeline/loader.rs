//! Dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use super::dataset::RawObservation;
use super::error::PipelineError;

/// Columns every input table must provide
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "species",
    "island",
    "bill_length_mm",
    "bill_depth_mm",
    "flipper_length_mm",
    "body_mass_g",
    "sex",
    "year",
];

/// Token used for missing values in the penguin CSV exports
const NULL_TOKEN: &str = "NA";

/// Load a table from a file (CSV or Parquet based on extension).
///
/// `infer_schema_length` of 0 scans the whole CSV for type inference.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(if infer_schema_length == 0 {
                None
            } else {
                Some(infer_schema_length)
            })
            .with_null_values(Some(NullValues::AllColumnsSingle(NULL_TOKEN.into())))
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    let df = lf
        .collect()
        .with_context(|| format!("Failed to read rows from {}", path.display()))?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Load a table and convert it to raw (possibly incomplete) observations
pub fn load_observations(path: &Path, infer_schema_length: usize) -> Result<Vec<RawObservation>> {
    let df = load_dataset(path, infer_schema_length)?;
    observations_from_frame(&df)
}

/// Convert a DataFrame into raw observations, one per row.
///
/// Numeric columns are cast to f64 and `year` to an integer; anything that
/// fails to cast becomes a missing value rather than an error.
pub fn observations_from_frame(df: &DataFrame) -> Result<Vec<RawObservation>> {
    for name in REQUIRED_COLUMNS {
        if df.column(name).is_err() {
            return Err(PipelineError::MissingColumn(name.to_string()).into());
        }
    }

    let species = string_values(df, "species")?;
    let island = string_values(df, "island")?;
    let bill_length = float_values(df, "bill_length_mm")?;
    let bill_depth = float_values(df, "bill_depth_mm")?;
    let flipper_length = float_values(df, "flipper_length_mm")?;
    let body_mass = float_values(df, "body_mass_g")?;
    let sex = string_values(df, "sex")?;
    let year = int_values(df, "year")?;

    let rows = (0..df.height())
        .map(|i| RawObservation {
            species: species[i].clone(),
            island: island[i].clone(),
            bill_length_mm: bill_length[i],
            bill_depth_mm: bill_depth[i],
            flipper_length_mm: flipper_length[i],
            body_mass_g: body_mass[i],
            sex: sex[i].clone(),
            year: year[i],
        })
        .collect();

    Ok(rows)
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    let cast = col.cast(&DataType::String)?;
    let values = cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect();
    Ok(values)
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    let cast = col
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' must be numeric", name))?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

fn int_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    let cast = col
        .cast(&DataType::Int64)
        .with_context(|| format!("Column '{}' must be an integer", name))?;
    Ok(cast.i64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observations_from_frame() {
        let df = df! {
            "species" => ["Adelie", "Gentoo"],
            "island" => ["Torgersen", "Biscoe"],
            "bill_length_mm" => [Some(39.1f64), None],
            "bill_depth_mm" => [18.7f64, 13.2],
            "flipper_length_mm" => [181i64, 211],
            "body_mass_g" => [3750i64, 4500],
            "sex" => [Some("male"), None],
            "year" => [2007i64, 2008],
        }
        .unwrap();

        let rows = observations_from_frame(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].flipper_length_mm, Some(181.0));
        assert_eq!(rows[0].year, Some(2007));
        assert!(rows[1].bill_length_mm.is_none());
        assert!(rows[1].sex.is_none());
    }

    #[test]
    fn test_missing_column_is_reported() {
        let df = df! {
            "species" => ["Adelie"],
            "island" => ["Dream"],
        }
        .unwrap();

        let err = observations_from_frame(&df).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingColumn("bill_length_mm".to_string()))
        );
    }
}
