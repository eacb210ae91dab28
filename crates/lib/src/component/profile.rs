//! Build profiles and values that vary by profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key selecting the fallback entry of a per-profile table.
pub const FALLBACK_KEY: &str = "_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
  Debug,
  #[default]
  Release,
}

impl Profile {
  pub fn as_str(&self) -> &'static str {
    match self {
      Profile::Debug => "debug",
      Profile::Release => "release",
    }
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Profile {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "debug" => Ok(Profile::Debug),
      "release" => Ok(Profile::Release),
      other => Err(format!("unknown profile '{other}' (expected debug or release)")),
    }
  }
}

/// A value that is either uniform or keyed by profile name.
///
/// A per-profile table is looked up by the profile name, then by `_`, and
/// resolves to the empty value when neither key exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Profiled<T> {
  Uniform(T),
  PerProfile(BTreeMap<String, T>),
}

impl<T: Default> Default for Profiled<T> {
  fn default() -> Self {
    Profiled::Uniform(T::default())
  }
}

impl<T: Clone + Default> Profiled<T> {
  pub fn resolve(&self, profile: Profile) -> T {
    match self {
      Profiled::Uniform(value) => value.clone(),
      Profiled::PerProfile(table) => table
        .get(profile.as_str())
        .or_else(|| table.get(FALLBACK_KEY))
        .cloned()
        .unwrap_or_default(),
    }
  }
}

impl<T> From<T> for Profiled<T> {
  fn from(value: T) -> Self {
    Profiled::Uniform(value)
  }
}
