/// Source identifiers. These are the ids used on the command line, in
/// `pipeline.toml` section names and as suffixes of persisted table names.
pub const MASS_MOBILIZATION: &str = "mass_mobilization";
pub const POLITY: &str = "polity";
pub const DPI: &str = "dpi";

/// Marker attached to rows whose raw country key has no canonical identity.
pub const IGNORE: &str = "ignore";

/// Identity columns every resolved table carries.
pub const JOIN_KEY_COLUMN: &str = "join_key";
pub const COUNTRY_COLUMN: &str = "country";
pub const CODE_COLUMN: &str = "ccode";
pub const YEAR_COLUMN: &str = "year";

pub const IDENTITY_COLUMNS: [&str; 4] = [JOIN_KEY_COLUMN, COUNTRY_COLUMN, CODE_COLUMN, YEAR_COLUMN];

/// Persisted table names
pub const JOINED_TABLE: &str = "joined";
pub const ANALYSIS_TABLE: &str = "analysis";

pub fn clean_table_name(source_id: &str) -> String {
    format!("clean_{}", source_id)
}

pub fn unmapped_table_name(source_id: &str) -> String {
    format!("unmapped_{}", source_id)
}

/// Build a join key from a year and a canonical country code.
pub fn join_key(year: i64, code: &str) -> String {
    format!("{}_{}", year, code)
}

/// All sources in the order they are joined. The event-grained source comes
/// first so it anchors the join.
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![MASS_MOBILIZATION, POLITY, DPI]
}
