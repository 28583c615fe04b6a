//! Country-key resolution: raw (name, code) pairs to canonical identities.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::constants::{self, CODE_COLUMN, COUNTRY_COLUMN, IGNORE, JOIN_KEY_COLUMN, YEAR_COLUMN};
use crate::domain::{Column, ColumnKind, Table, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::ResolveMetrics;
use crate::pipeline::processing::schema::KeyColumns;

/// Canonical (country name, short code) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryIdentity {
    pub country: String,
    pub code: String,
}

impl CountryIdentity {
    pub fn new(country: &str, code: &str) -> Self {
        Self {
            country: country.to_string(),
            code: code.to_string(),
        }
    }

    pub fn is_ignore(&self) -> bool {
        self.code == IGNORE
    }

    fn ignore() -> Self {
        Self::new(IGNORE, IGNORE)
    }
}

impl std::fmt::Display for CountryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.country, self.code)
    }
}

/// One row of the curated lookup spreadsheet.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupRow {
    pub raw_name: String,
    pub raw_code: String,
    pub country: String,
    pub code: String,
}

/// Raw (name, code) pair as found in a source, trimmed.
pub type RawKey = (String, String);

fn raw_pair(name: &str, code: &str) -> RawKey {
    (name.trim().to_string(), code.trim().to_string())
}

/// Display form `{raw name}_{raw code}`, used in errors and the audit table.
pub fn raw_key(name: &str, code: &str) -> String {
    format!("{}_{}", name.trim(), code.trim())
}

/// Validated many-to-one mapping from raw keys to canonical identities.
#[derive(Debug, Clone, Default)]
pub struct CountryLookup {
    entries: HashMap<RawKey, CountryIdentity>,
}

impl CountryLookup {
    /// Build a lookup, failing on a raw key with two identities or a
    /// canonical code with two names. Exact duplicate rows are tolerated.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = LookupRow>,
    {
        let mut entries: HashMap<RawKey, CountryIdentity> = HashMap::new();
        let mut names_by_code: HashMap<String, String> = HashMap::new();

        for row in rows {
            let key = raw_pair(&row.raw_name, &row.raw_code);
            let identity = CountryIdentity::new(row.country.trim(), row.code.trim());

            if !identity.is_ignore() {
                if let Some(existing) = names_by_code.get(&identity.code) {
                    if *existing != identity.country {
                        return Err(PipelineError::ConflictingCanonicalName {
                            code: identity.code.clone(),
                            first: existing.clone(),
                            second: identity.country.clone(),
                        });
                    }
                } else {
                    names_by_code.insert(identity.code.clone(), identity.country.clone());
                }
            }

            match entries.get(&key) {
                Some(existing) if *existing != identity => {
                    return Err(PipelineError::AmbiguousCountry {
                        raw_key: raw_key(&key.0, &key.1),
                        first: existing.to_string(),
                        second: identity.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    entries.insert(key, identity);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Load the lookup from a CSV with header `raw_name,raw_code,country,code`.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let rows = reader
            .deserialize::<LookupRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let lookup = Self::from_rows(rows)?;
        info!(path = %path.display(), entries = lookup.len(), "Loaded country lookup");
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical identity for a raw pair; `None` when the pair is unmapped.
    pub fn lookup(&self, name: &str, code: &str) -> Option<&CountryIdentity> {
        self.entries.get(&raw_pair(name, code))
    }
}

/// What happened to each row during resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub ignored: usize,
    /// Rows without year context or without any country context.
    pub excluded: usize,
    /// Raw keys that resolved to `ignore`, with the number of rows each.
    pub ignored_keys: BTreeMap<RawKey, usize>,
}

impl ResolutionReport {
    /// The ignored keys as a table for the audit store.
    pub fn ignored_table(&self, name: &str) -> Table {
        let rows = self
            .ignored_keys
            .iter()
            .map(|((raw_name, raw_code), count)| {
                vec![
                    Value::text(raw_key(raw_name, raw_code)),
                    Value::text(raw_name.clone()),
                    Value::text(raw_code.clone()),
                    Value::Int(*count as i64),
                ]
            })
            .collect();
        Table::new(
            name,
            vec![
                Column::new("raw_key", ColumnKind::Text),
                Column::new("raw_name", ColumnKind::Text),
                Column::new("raw_code", ColumnKind::Text),
                Column::new("rows", ColumnKind::Integer),
            ],
        )
        .with_rows(rows)
    }
}

/// Attaches canonical identities and join keys to cleaned tables.
pub struct CountryKeyResolver<'a> {
    lookup: &'a CountryLookup,
}

impl<'a> CountryKeyResolver<'a> {
    pub fn new(lookup: &'a CountryLookup) -> Self {
        Self { lookup }
    }

    /// Replace the raw name, code and year columns with `join_key`, `country`,
    /// `ccode` and `year` (in that order, leading the table).
    #[instrument(skip(self, table), fields(table = %table.name, rows = table.len()))]
    pub fn resolve(&self, mut table: Table, keys: &KeyColumns) -> Result<(Table, ResolutionReport)> {
        let table_name = table.name.clone();
        let missing = |c: &str| PipelineError::UnknownColumn {
            source_id: table_name.clone(),
            column: c.to_string(),
        };
        let (_, names) = table.remove_column(&keys.name).ok_or_else(|| missing(&keys.name))?;
        let (_, codes) = table.remove_column(&keys.code).ok_or_else(|| missing(&keys.code))?;
        let (_, years) = table.remove_column(&keys.year).ok_or_else(|| missing(&keys.year))?;

        let mut report = ResolutionReport::default();
        let mut rows = Vec::with_capacity(table.rows.len());

        for (((row, name), code), year) in table.rows.drain(..).zip(names).zip(codes).zip(years) {
            let year = match year.as_i64() {
                Some(y) => y,
                None => {
                    report.excluded += 1;
                    continue;
                }
            };
            if name.is_missing() && code.is_missing() {
                report.excluded += 1;
                continue;
            }

            let (name, code) = (name.render(), code.render());
            let identity = match self.lookup.lookup(&name, &code) {
                Some(identity) => identity.clone(),
                None => CountryIdentity::ignore(),
            };

            let key = if identity.is_ignore() {
                *report.ignored_keys.entry(raw_pair(&name, &code)).or_insert(0) += 1;
                report.ignored += 1;
                IGNORE.to_string()
            } else {
                report.resolved += 1;
                constants::join_key(year, &identity.code)
            };

            let mut out = Vec::with_capacity(row.len() + 4);
            out.push(Value::Text(key));
            out.push(Value::Text(identity.country));
            out.push(Value::Text(identity.code));
            out.push(Value::Int(year));
            out.extend(row);
            rows.push(out);
        }

        let mut columns = vec![
            Column::new(JOIN_KEY_COLUMN, ColumnKind::Text),
            Column::new(COUNTRY_COLUMN, ColumnKind::Text),
            Column::new(CODE_COLUMN, ColumnKind::Text),
            Column::new(YEAR_COLUMN, ColumnKind::Integer),
        ];
        columns.extend(table.columns.drain(..));
        table.columns = columns;
        table.rows = rows;

        ResolveMetrics::record(&table.name, &report);
        if report.ignored > 0 {
            warn!(
                ignored = report.ignored,
                distinct_keys = report.ignored_keys.len(),
                "Rows with unmapped country keys marked '{}'",
                IGNORE
            );
        }
        info!(
            resolved = report.resolved,
            ignored = report.ignored,
            excluded = report.excluded,
            "Country keys resolved"
        );
        Ok((table, report))
    }
}
