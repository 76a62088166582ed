use crate::error::{AcousticaError, Result};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Free-form attributes of a scene node, queried by receiver encoders and
/// source plugins when they are instantiated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Display) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Display) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parses `key`, falling back to `default` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value cannot be parsed.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
    {
        match self.values.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                AcousticaError::config(format!("Invalid value \"{}\" for attribute {}", raw, key))
            }),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.values.get(key).map(|v| v.trim()) {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(other) => Err(AcousticaError::config(format!(
                "Invalid boolean \"{}\" for attribute {}",
                other, key
            ))),
        }
    }

    /// Angle given in degrees, returned in radians.
    pub fn get_deg(&self, key: &str, default_deg: f64) -> Result<f64> {
        Ok(self.get_or(key, default_deg)? * crate::math::DEG2RAD)
    }

    /// Level given in dB, returned as linear gain.
    pub fn get_db(&self, key: &str, default_db: f64) -> Result<f64> {
        Ok(10f64.powf(self.get_or(key, default_db)? / 20.0))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
