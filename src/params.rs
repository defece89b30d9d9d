use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named rate constants as supplied by the caller.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, f64>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named constant, returning `self` for chaining.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| SimError::MissingParameter(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, f64)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Rate constants resolved from [`Params`] and validated.
///
/// Resolved once per run so that rate evaluation never looks names up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Target birth rate (`b_T`).
    pub b_t: f64,
    /// Effector death rate (`d_E`).
    pub d_e: f64,
    /// Effector binding rate (`lambda_E`).
    pub lambda_e: f64,
    /// Target binding rate (`lambda_T`).
    pub lambda_t: f64,
    /// Effector internalization rate (`mu_E`).
    pub mu_e: f64,
    /// Target internalization rate (`mu_T`).
    pub mu_t: f64,
    /// Effector-target encounter rate (`lambda_ET`).
    pub lambda_et: f64,
    /// Success probability of a binder-free bridge (`p_E|T`).
    pub p_e_t: f64,
    /// Success probability of a bridge through target-bound binder (`p_E|DT`).
    pub p_e_dt: f64,
    /// Success probability of a bridge through effector-bound binder (`p_ED|T`).
    pub p_ed_t: f64,
    /// Binding attempts per encounter (`M`).
    pub m: f64,
    /// Trimer dissociation rate (`d_EDT`).
    pub d_edt: f64,
    /// Dimer dissociation rate (`d_ET`).
    pub d_et: f64,
}

const RATE_NAMES: [&str; 9] = [
    "b_T", "d_E", "lambda_E", "lambda_T", "mu_E", "mu_T", "lambda_ET", "d_EDT", "d_ET",
];
const PROB_NAMES: [&str; 3] = ["p_E|T", "p_E|DT", "p_ED|T"];
const MULTIPLICITY_NAME: &str = "M";

impl Rates {
    /// Resolve and validate every required constant.
    ///
    /// # Errors
    /// [`SimError::MissingParameter`] if a required name is absent and
    /// [`SimError::InvalidParameter`] if a value is out of range.
    pub fn from_params(params: &Params) -> Result<Self> {
        for name in RATE_NAMES {
            check_range(name, params.get(name)?, 0.0, f64::INFINITY)?;
        }
        for name in PROB_NAMES {
            check_range(name, params.get(name)?, 0.0, 1.0)?;
        }
        check_range(
            MULTIPLICITY_NAME,
            params.get(MULTIPLICITY_NAME)?,
            0.0,
            f64::INFINITY,
        )?;

        for name in params.names() {
            let known = RATE_NAMES.contains(&name)
                || PROB_NAMES.contains(&name)
                || name == MULTIPLICITY_NAME;
            if !known {
                log::debug!("parameter {name:?} is not used by any event");
            }
        }

        Ok(Self {
            b_t: params.get("b_T")?,
            d_e: params.get("d_E")?,
            lambda_e: params.get("lambda_E")?,
            lambda_t: params.get("lambda_T")?,
            mu_e: params.get("mu_E")?,
            mu_t: params.get("mu_T")?,
            lambda_et: params.get("lambda_ET")?,
            p_e_t: params.get("p_E|T")?,
            p_e_dt: params.get("p_E|DT")?,
            p_ed_t: params.get("p_ED|T")?,
            m: params.get(MULTIPLICITY_NAME)?,
            d_edt: params.get("d_EDT")?,
            d_et: params.get("d_ET")?,
        })
    }

    /// All constants zero: no event can ever fire.
    pub fn zero() -> Self {
        Self {
            b_t: 0.0,
            d_e: 0.0,
            lambda_e: 0.0,
            lambda_t: 0.0,
            mu_e: 0.0,
            mu_t: 0.0,
            lambda_et: 0.0,
            p_e_t: 0.0,
            p_e_dt: 0.0,
            p_ed_t: 0.0,
            m: 0.0,
            d_edt: 0.0,
            d_et: 0.0,
        }
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    // NaN fails both comparisons.
    if !(value >= min && value <= max) {
        return Err(SimError::InvalidParameter {
            name: name.to_string(),
            reason: format!("value must be in the range [{min}, {max}], but is {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params::new()
        .with("b_E", 0.0)
        .with("b_T", 0.03)
        .with("d_E", 0.03)
        .with("d_T", 0.0)
        .with("lambda_E", 0.001)
        .with("lambda_T", 0.001)
        .with("mu_E", 0.01)
        .with("mu_T", 0.01)
        .with("lambda_ET", 0.01)
        .with("p_E|T", 0.01)
        .with("p_E|DT", 0.8)
        .with("p_ED|T", 0.8)
        .with("M", 2.0)
        .with("d_EDT", 1.0)
        .with("d_ET", 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_named_constants() {
        let rates = Rates::from_params(&test_params()).unwrap();
        assert_eq!(rates.b_t, 0.03);
        assert_eq!(rates.p_e_dt, 0.8);
        assert_eq!(rates.m, 2.0);
        assert_eq!(rates.d_et, 1.0);
    }

    #[test]
    fn missing_parameter_is_not_defaulted() {
        let mut params = test_params();
        params.0.remove("lambda_ET");
        assert_eq!(
            Rates::from_params(&params),
            Err(SimError::MissingParameter("lambda_ET".to_string()))
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let params = test_params().with("p_E|T", 1.5);
        assert!(matches!(
            Rates::from_params(&params),
            Err(SimError::InvalidParameter { name, .. }) if name == "p_E|T"
        ));

        let params = test_params().with("d_ET", -1.0);
        assert!(Rates::from_params(&params).is_err());

        let params = test_params().with("mu_T", f64::NAN);
        assert!(Rates::from_params(&params).is_err());
    }
}
