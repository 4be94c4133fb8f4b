//! Scenario catalog
//!
//! Loads the mapping of scenario name to scenario entry from YAML (or JSON,
//! by `.json` extension). Entries keep their declaration order so repeated
//! invocations process scenarios identically.
//!
//! ```yaml
//! S1:
//!   seeds: 3          # successful seeds to accumulate
//!   energy: 6         # MeV; number or string
//!   particle: proton
//!   histories: 1000
//! ```
//!
//! Only the four keys above are consumed; anything else in an entry is ignored.
//!
//! Energy keeps the form it was written in: `6` becomes `"6"`, `6.0` becomes
//! `"6.0"` and `6.5` becomes `"6.5"`. The text ends up in the archive folder
//! name, so `6` and `6.0` are different scenarios on disk.

use crate::error::CatalogError;
use crate::types::ScenarioSpec;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Scenario entry as written in the catalog, before validation
#[derive(Debug, Deserialize)]
struct RawScenario {
    seeds: Option<i64>,
    energy: Option<EnergyValue>,
    particle: Option<String>,
    histories: Option<i64>,
}

/// Energies may be written as integers, floats or strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnergyValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EnergyValue {
    fn into_text(self) -> String {
        match self {
            Self::Integer(n) => n.to_string(),
            // Debug keeps the `.0` of whole floats
            Self::Float(x) => format!("{x:?}"),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

/// Ordered, validated set of scenarios
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: IndexMap<String, ScenarioSpec>,
}

impl ScenarioCatalog {
    /// Load a catalog file
    ///
    /// # Errors
    /// [`CatalogError`] if the file is missing, malformed, or an entry lacks
    /// `seeds`, `energy`, `particle` or `histories`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let catalog = if is_json {
            Self::from_json_str(&source, path)?
        } else {
            Self::from_yaml_str(&source, path)?
        };

        tracing::info!(
            "Loaded {} scenario(s) from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse a YAML catalog; `origin` only labels errors
    pub fn from_yaml_str(source: &str, origin: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let origin = origin.into();
        let raw: IndexMap<String, RawScenario> =
            serde_yaml::from_str(source).map_err(|e| CatalogError::malformed(&origin, e))?;
        Self::from_raw(raw)
    }

    /// Parse a JSON catalog; `origin` only labels errors
    pub fn from_json_str(source: &str, origin: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let origin = origin.into();
        let raw: IndexMap<String, RawScenario> =
            serde_json::from_str(source).map_err(|e| CatalogError::malformed(&origin, e))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: IndexMap<String, RawScenario>) -> Result<Self, CatalogError> {
        let mut scenarios = IndexMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let spec = validate(&name, entry)?;
            scenarios.insert(name, spec);
        }
        Ok(Self { scenarios })
    }

    /// Build a catalog directly from specs, keeping their order
    #[must_use]
    pub fn from_specs(specs: impl IntoIterator<Item = ScenarioSpec>) -> Self {
        Self {
            scenarios: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Scenarios in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioSpec> {
        self.scenarios.values()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScenarioSpec> {
        self.scenarios.get(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl<'a> IntoIterator for &'a ScenarioCatalog {
    type Item = &'a ScenarioSpec;
    type IntoIter = indexmap::map::Values<'a, String, ScenarioSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenarios.values()
    }
}

fn validate(name: &str, entry: RawScenario) -> Result<ScenarioSpec, CatalogError> {
    let missing = |field| CatalogError::MissingField {
        scenario: name.to_string(),
        field,
    };

    let seeds = entry.seeds.ok_or_else(|| missing("seeds"))?;
    let energy = entry.energy.ok_or_else(|| missing("energy"))?.into_text();
    let particle = entry.particle.ok_or_else(|| missing("particle"))?;
    let histories = entry.histories.ok_or_else(|| missing("histories"))?;

    let target_seeds = at_least_one(name, "seeds", seeds)?;
    let histories = at_least_one(name, "histories", histories)?;

    if energy.is_empty() {
        return Err(missing("energy"));
    }
    if particle.trim().is_empty() {
        return Err(missing("particle"));
    }

    Ok(ScenarioSpec {
        name: name.to_string(),
        target_seeds,
        energy,
        particle: particle.trim().to_string(),
        histories,
    })
}

fn at_least_one<T: TryFrom<i64>>(
    scenario: &str,
    field: &'static str,
    value: i64,
) -> Result<T, CatalogError> {
    if value < 1 {
        return Err(CatalogError::OutOfRange {
            scenario: scenario.to_string(),
            field,
            value,
        });
    }
    T::try_from(value).map_err(|_| CatalogError::OutOfRange {
        scenario: scenario.to_string(),
        field,
        value,
    })
}
