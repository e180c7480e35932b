//! Code for reading scalar model parameters.
use super::{input_err_msg, read_csv};
use crate::units::UnitType;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, PartialEq, Deserialize)]
struct ScalarParameterRaw {
    var_name: String,
    value: f64,
}

/// Scalar parameter values, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarParameters(IndexMap<String, f64>);

impl ScalarParameters {
    /// Look up a parameter value
    pub fn get(&self, name: &str) -> Result<f64> {
        self.0
            .get(name)
            .copied()
            .with_context(|| format!("Missing parameter: {name}"))
    }

    /// Look up a parameter value as a given unit
    pub fn get_unit<U: UnitType>(&self, name: &str) -> Result<U> {
        self.get(name).map(U::new)
    }

    /// Look up a parameter which must be a whole number of years
    pub fn get_years(&self, name: &str) -> Result<u32> {
        let value = self.get(name)?;
        ensure!(
            value.fract() == 0.0 && value >= 1.0 && value <= f64::from(u32::MAX),
            "Parameter {name} must be a whole number of years, got {value}"
        );

        Ok(value as u32)
    }

    /// Set an existing parameter to a new value.
    ///
    /// Overriding a parameter which does not exist is an error, as it almost certainly means a
    /// variable has been misspelt.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let Some(old) = self.0.get_mut(name) else {
            bail!("Cannot override unknown parameter: {name}");
        };
        debug!("Overriding parameter {name}: {old} -> {value}");
        *old = value;

        Ok(())
    }

    /// Iterate over parameters in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// The number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add parameters from an iterator, rejecting any name which is already present
    fn extend_unique<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = ScalarParameterRaw>,
    {
        for param in iter {
            ensure!(
                param.value.is_finite(),
                "Parameter {} has non-finite value",
                param.var_name
            );
            if self.0.contains_key(&param.var_name) {
                bail!("Parameter {} is defined more than once", param.var_name);
            }
            self.0.insert(param.var_name, param.value);
        }

        Ok(())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ScalarParameters {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}

/// Read and concatenate scalar parameter tables.
///
/// Each file must have a `var_name` and a `value` column. A parameter may only be defined once
/// across all files.
///
/// # Arguments
///
/// * `file_paths` - The parameter files, e.g. the system and the variation table
pub fn read_scalar_parameters(file_paths: &[&Path]) -> Result<ScalarParameters> {
    let mut params = ScalarParameters::default();
    for file_path in file_paths {
        let rows = read_csv::<ScalarParameterRaw>(file_path)?;
        params
            .extend_unique(rows)
            .with_context(|| input_err_msg(file_path))?;
    }

    Ok(params)
}
