// Source-specific cleaning profiles and the single-source cleaning pass
pub mod dpi;
pub mod mass_mobilization;
pub mod polity;

pub use dpi::DpiProfile;
pub use mass_mobilization::MassMobilizationProfile;
pub use polity::PolityProfile;

use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

use crate::constants::{self, get_supported_sources, IGNORE, JOIN_KEY_COLUMN};
use crate::domain::{Table, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::CleanMetrics;
use crate::pipeline::processing::country::{CountryKeyResolver, CountryLookup, ResolutionReport};
use crate::pipeline::processing::schema::{
    CleanReport, ColumnSpec, DeclaredType, Granularity, SchemaCleaner, SourceSchema,
};

/// Everything the pipeline knows about one source dataset: its built-in
/// cleaning rules and any fields derived from the cleaned columns.
pub trait SourceProfile: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Built-in rules, used unless the configuration points at an override.
    fn schema(&self) -> SourceSchema;

    /// Add derived columns. Runs after remaps and before the core-field row
    /// filter, on raw key columns.
    fn derive(&self, table: Table) -> Result<Table> {
        Ok(table)
    }
}

/// Declare every name in `names` with the same type.
pub(crate) fn declare(ty: DeclaredType, names: &[&str]) -> Vec<ColumnSpec> {
    names.iter().map(|n| ColumnSpec::new(n, ty)).collect()
}

pub(crate) fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Registry of source profiles keyed by source id
pub struct SourceRegistry {
    profiles: HashMap<String, Box<dyn SourceProfile>>,
}

impl SourceRegistry {
    /// Create a registry holding the three built-in sources
    pub fn new() -> Self {
        let mut registry = Self {
            profiles: HashMap::new(),
        };
        registry.register(Box::new(MassMobilizationProfile));
        registry.register(Box::new(PolityProfile));
        registry.register(Box::new(DpiProfile));
        registry
    }

    pub fn register(&mut self, profile: Box<dyn SourceProfile>) {
        self.profiles.insert(profile.source_id().to_string(), profile);
    }

    pub fn get(&self, source_id: &str) -> Result<&dyn SourceProfile> {
        self.profiles
            .get(source_id)
            .map(|p| p.as_ref())
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))
    }

    /// Registered ids, built-in sources first in join order
    pub fn list_sources(&self) -> Vec<&str> {
        let builtin = get_supported_sources();
        let mut extra: Vec<&str> = self
            .profiles
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !builtin.contains(k))
            .collect();
        extra.sort();
        builtin
            .into_iter()
            .filter(|id| self.profiles.contains_key(*id))
            .chain(extra)
            .collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of one cleaning pass over a whole source.
#[derive(Debug, Clone)]
pub struct CleanedSource {
    pub source_id: String,
    pub granularity: Granularity,
    pub table: Table,
    pub clean: CleanReport,
    pub resolution: ResolutionReport,
}

/// Clean one raw source end to end: prune, normalize, coerce, remap, derive,
/// filter rows without core data, then resolve country keys.
#[instrument(skip(profile, schema, raw, lookup), fields(source_id = profile.source_id(), raw_rows = raw.len()))]
pub fn clean_source(
    profile: &dyn SourceProfile,
    schema: SourceSchema,
    raw: Table,
    lookup: &CountryLookup,
) -> Result<CleanedSource> {
    if schema.source_id != profile.source_id() {
        return Err(PipelineError::Config(format!(
            "Schema for '{}' used to clean source '{}'",
            schema.source_id,
            profile.source_id()
        )));
    }
    let granularity = schema.granularity;
    let keys = schema.keys.clone();
    let cleaner = SchemaCleaner::new(schema)?;

    let mut report = CleanReport::default();
    let table = cleaner.prepare(raw, &mut report)?;
    let table = profile.derive(table)?;
    let mut table = cleaner.filter_core(table, &mut report)?;
    table.name = constants::clean_table_name(profile.source_id());

    let (table, resolution) = CountryKeyResolver::new(lookup).resolve(table, &keys)?;
    if granularity == Granularity::CountryYear {
        ensure_unique_keys(&table)?;
    }
    CleanMetrics::record(&report);
    info!(
        rows_out = table.len(),
        columns = table.columns.len(),
        "Source cleaned"
    );

    Ok(CleanedSource {
        source_id: profile.source_id().to_string(),
        granularity,
        table,
        clean: report,
        resolution,
    })
}

/// A country-year table holds at most one row per resolved join key.
/// Rows keyed `ignore` are exempt.
fn ensure_unique_keys(table: &Table) -> Result<()> {
    let Some(idx) = table.column_index(JOIN_KEY_COLUMN) else {
        return Ok(());
    };
    let mut seen = HashSet::new();
    for row in &table.rows {
        if let Value::Text(key) = &row[idx] {
            if key != IGNORE && !seen.insert(key.as_str()) {
                return Err(PipelineError::DuplicateJoinKey {
                    table: table.name.clone(),
                    key: key.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::read_csv_table;
    use std::path::{Path, PathBuf};

    fn resources() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("resources")
    }

    fn lookup() -> CountryLookup {
        CountryLookup::from_csv(&resources().join("country_lookup.csv")).unwrap()
    }

    #[test]
    fn test_duplicate_country_year_fails_cleaning() {
        let mut raw = read_csv_table(&resources().join("polity.csv"), "polity").unwrap();
        let first = raw.rows[0].clone();
        raw.rows.push(first);

        let profile = PolityProfile;
        match clean_source(&profile, profile.schema(), raw, &lookup()) {
            Err(PipelineError::DuplicateJoinKey { table, key }) => {
                assert_eq!(table, "clean_polity");
                assert_eq!(key, "2005_KEN");
            }
            other => panic!("expected DuplicateJoinKey, got {:?}", other.map(|c| c.table.name)),
        }
    }

    #[test]
    fn test_repeated_event_keys_are_kept() {
        let raw = read_csv_table(&resources().join("mass_mobilization.csv"), "mm").unwrap();
        let profile = MassMobilizationProfile;
        let cleaned = clean_source(&profile, profile.schema(), raw, &lookup()).unwrap();
        let keys: Vec<String> = cleaned.table.rows.iter().map(|r| r[0].render()).collect();
        assert_eq!(keys.iter().filter(|k| *k == "2005_KEN").count(), 2);
    }

    #[test]
    fn test_registry_has_built_in_sources() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.list_sources(), vec!["mass_mobilization", "polity", "dpi"]);
    }

    #[test]
    fn test_registry_returns_error_for_unknown_source() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.get("vdem"),
            Err(PipelineError::UnknownSource(ref id)) if id == "vdem"
        ));
    }

    #[test]
    fn test_built_in_schemas_are_valid() {
        let registry = SourceRegistry::new();
        for id in registry.list_sources() {
            let profile = registry.get(id).unwrap();
            let schema = profile.schema();
            assert_eq!(schema.source_id, id);
            schema.validate().unwrap();
        }
    }

    #[test]
    fn test_sample_override_file_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("schemas/polity.toml");
        let schema = SourceSchema::from_toml_file(&path).unwrap();
        assert_eq!(schema.source_id, "polity");
        assert_eq!(schema.remaps.len(), 3);
        SchemaCleaner::new(schema).unwrap();
    }

    #[test]
    fn test_built_in_schema_round_trips_through_toml() {
        let schema = DpiProfile.schema();
        let text = toml::to_string(&schema).unwrap();
        let back: SourceSchema = toml::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }
}
