//! Code for reading per-timestep driver values (solar gain, loads, prices).
use super::{input_err_msg, open_csv};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use std::path::Path;

/// Named columns of per-timestep values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    columns: IndexMap<String, Vec<f64>>,
    /// Column sums over every row read, unaffected by truncation
    totals: IndexMap<String, f64>,
    len: usize,
}

impl TimeSeries {
    /// Create a time series from named columns, which must all have the same length
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let columns: IndexMap<String, Vec<f64>> = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect();
        let len = columns.values().next().map_or(0, Vec::len);
        ensure!(
            columns.values().all(|values| values.len() == len),
            "Time series columns have different lengths"
        );

        let totals = columns
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().sum()))
            .collect();

        Ok(Self {
            columns,
            totals,
            len,
        })
    }

    /// Get the values of a named column
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .with_context(|| format!("Time series has no column named '{name}'"))
    }

    /// The sum of a named column over all rows, including any removed by [`Self::truncate`]
    pub fn column_total(&self, name: &str) -> Result<f64> {
        self.totals
            .get(name)
            .copied()
            .with_context(|| format!("Time series has no column named '{name}'"))
    }

    /// The number of timesteps
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no timesteps
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keep only the first `n` timesteps
    pub fn truncate(&mut self, n: usize) -> Result<()> {
        ensure!(
            n <= self.len,
            "Requested {n} timesteps but time series only has {}",
            self.len
        );
        for values in self.columns.values_mut() {
            values.truncate(n);
        }
        self.len = n;

        Ok(())
    }
}

/// Read a time series file.
///
/// Every column must be numeric and every row must have a value for every column.
pub fn read_timeseries(file_path: &Path) -> Result<TimeSeries> {
    let mut reader = open_csv(file_path)?;
    let headers = reader
        .headers()
        .with_context(|| input_err_msg(file_path))?
        .clone();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        for (col_idx, field) in record.iter().enumerate() {
            let value: f64 = field.parse().with_context(|| {
                format!(
                    "{}: invalid value '{field}' in column '{}', row {}",
                    file_path.display(),
                    &headers[col_idx],
                    row_idx + 1
                )
            })?;
            columns[col_idx].push(value);
        }
    }

    let series = TimeSeries::from_columns(headers.iter().zip(columns))
        .with_context(|| input_err_msg(file_path))?;
    ensure!(
        !series.is_empty(),
        "{}: time series contains no data rows",
        file_path.display()
    );

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn read_timeseries_works() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("ts.csv");
        fs::write(
            &file_path,
            "solar gain kWprom2;Cooling load kW\n0.0;10\n0.5;12\n0.8;15\n",
        )
        .unwrap();

        let mut series = read_timeseries(&file_path).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.column("Cooling load kW").unwrap(), [10.0, 12.0, 15.0]);

        series.truncate(2).unwrap();
        assert_eq!(series.column("solar gain kWprom2").unwrap(), [0.0, 0.5]);
        assert_eq!(series.column_total("Cooling load kW").unwrap(), 37.0);
        assert!(series.truncate(3).is_err());
        assert!(series.column("PV normiert").is_err());
    }

    #[test]
    fn read_timeseries_bad_value() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("ts.csv");
        fs::write(&file_path, "load\n1.0\nabc\n").unwrap();
        assert!(read_timeseries(&file_path).is_err());
    }
}
