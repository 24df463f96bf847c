//! Raw multivariate series loading
//!
//! Reads numeric CSV files (one row per timestep, one column per feature)
//! into a `[T, F]` array. Cleaning and resampling are left to the caller.

use ndarray::{s, Array2};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::{AnomalyError, Result};

/// Load a numeric CSV with a header row into a `[T, F]` array
///
/// Columns listed in `skip_columns` (for example a timestamp) are ignored.
pub fn load_csv<P: AsRef<Path>>(path: P, skip_columns: &[&str]) -> Result<(Array2<f32>, Vec<String>)> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !skip_columns.contains(name))
        .map(|(i, _)| i)
        .collect();
    let feature_names: Vec<String> = keep.iter().map(|&i| headers[i].to_string()).collect();

    let mut values = Vec::new();
    let mut rows = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        for &col in &keep {
            let field = record.get(col).unwrap_or("").trim();
            let value: f32 = field.parse().map_err(|_| {
                AnomalyError::InvalidConfig(format!(
                    "non-numeric value {:?} in column {} at row {}",
                    field,
                    headers.get(col).unwrap_or("?"),
                    line + 1
                ))
            })?;
            values.push(value);
        }
        rows += 1;
    }

    if rows == 0 || keep.is_empty() {
        return Err(AnomalyError::InsufficientData(format!(
            "{} contains no numeric data",
            path.as_ref().display()
        )));
    }

    debug!(
        "Loaded {} rows x {} features from {}",
        rows,
        keep.len(),
        path.as_ref().display()
    );

    let series = Array2::from_shape_vec((rows, keep.len()), values)
        .map_err(|e| AnomalyError::shape("csv rows", keep.len(), e.to_string()))?;
    Ok((series, feature_names))
}

/// Split a series chronologically into a leading and a trailing part
pub fn train_test_split(series: &Array2<f32>, train_ratio: f64) -> Result<(Array2<f32>, Array2<f32>)> {
    if !(0.0..=1.0).contains(&train_ratio) {
        return Err(AnomalyError::InvalidConfig(format!(
            "train ratio must lie in [0, 1], got {}",
            train_ratio
        )));
    }

    let split = (series.nrows() as f64 * train_ratio) as usize;
    Ok((
        series.slice(s![..split, ..]).to_owned(),
        series.slice(s![split.., ..]).to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_skips_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,temp,pressure").unwrap();
        writeln!(file, "1,20.5,1.0").unwrap();
        writeln!(file, "2,21.0,1.5").unwrap();
        writeln!(file, "3,19.5,0.5").unwrap();

        let (series, names) = load_csv(file.path(), &["timestamp"]).unwrap();
        assert_eq!(series.dim(), (3, 2));
        assert_eq!(names, vec!["temp".to_string(), "pressure".to_string()]);
        assert_eq!(series[[1, 0]], 21.0);
        assert_eq!(series[[2, 1]], 0.5);
    }

    #[test]
    fn test_load_csv_rejects_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,x").unwrap();
        assert!(load_csv(file.path(), &[]).is_err());
    }

    #[test]
    fn test_train_test_split() {
        let series = Array2::from_shape_fn((10, 2), |(t, _)| t as f32);
        let (train, test) = train_test_split(&series, 0.8).unwrap();
        assert_eq!(train.nrows(), 8);
        assert_eq!(test.nrows(), 2);
        assert_eq!(test[[0, 0]], 8.0);
        assert!(train_test_split(&series, 1.5).is_err());
    }
}
