use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use shrinkwraprs::Shrinkwrap;

use crate::errors::{PdsError, Result};

/// Immutable, ordered fields of a parsed scene identifier.
///
/// Raw captures come first in pattern order, derived fields follow.
#[derive(Shrinkwrap, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneFields(IndexMap<String, String>);

impl SceneFields {
    /// Field lookup that fails with the missing key.
    pub fn field(&self, key: &str) -> Result<&str> {
        self.lookup(key)
            .ok_or_else(|| PdsError::metadata("scene fields", key))
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Mutable view handed to a grammar's derive step, before the fields freeze.
pub type RawFields = IndexMap<String, String>;

/// Named scene-id family: candidate patterns tried in declared order,
/// plus the step computing derived fields from the raw captures.
pub struct SceneGrammar {
    pub name: &'static str,
    patterns: &'static [&'static str],
    derive: fn(&mut RawFields) -> Result<()>,
    compiled: OnceLock<std::result::Result<Vec<Regex>, regex::Error>>,
}

impl SceneGrammar {
    pub const fn new(
        name: &'static str,
        patterns: &'static [&'static str],
        derive: fn(&mut RawFields) -> Result<()>,
    ) -> Self {
        Self {
            name,
            patterns,
            derive,
            compiled: OnceLock::new(),
        }
    }

    fn regexes(&self) -> Result<&[Regex]> {
        self.compiled
            .get_or_init(|| self.patterns.iter().map(|p| Regex::new(p)).collect())
            .as_deref()
            .map_err(|error| PdsError::from(error.clone()))
    }

    pub fn matches(&self, raw: &str) -> bool {
        self.regexes()
            .map(|regexes| regexes.iter().any(|regex| regex.is_match(raw)))
            .unwrap_or(false)
    }

    pub fn parse(&self, raw: &str) -> Result<SceneFields> {
        let regexes = self.regexes()?;
        let (regex, captures) = regexes
            .iter()
            .find_map(|regex| regex.captures(raw).map(|captures| (regex, captures)))
            .ok_or_else(|| PdsError::invalid_scene_id(self.name, raw))?;

        let mut fields: RawFields = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|value| (name.to_string(), value.as_str().to_string()))
            })
            .collect();
        (self.derive)(&mut fields)?;
        Ok(SceneFields(fields))
    }
}

impl std::fmt::Debug for SceneGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGrammar")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .finish()
    }
}

/// Raw field lookup during derivation.
pub fn raw<'a>(fields: &'a RawFields, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| PdsError::metadata("scene id captures", key))
}

/// `"019"` -> `"19"`, `"0"` stays `"0"`.
pub fn strip_zeros(value: &str) -> String {
    let stripped = value.trim_start_matches('0');
    if stripped.is_empty() && !value.is_empty() {
        "0".into()
    } else {
        stripped.into()
    }
}

/// Insert `date` as `YYYY-MM-DD` from the acquisition captures.
pub fn insert_date(fields: &mut RawFields) -> Result<()> {
    let date = format!(
        "{}-{}-{}",
        raw(fields, "acquisition_year")?,
        raw(fields, "acquisition_month")?,
        raw(fields, "acquisition_day")?
    );
    fields.insert("date".into(), date);
    Ok(())
}
