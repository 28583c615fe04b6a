use std::collections::HashSet;

use super::{declare, owned, SourceProfile};
use crate::constants::POLITY;
use crate::domain::{Column, ColumnKind, Table, Value};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::schema::{
    DeclaredType, Granularity, KeyColumns, Remap, RemapRule, SourceSchema,
};
use crate::pipeline::processing::sentinel::SentinelSet;

/// Codes for interruption, interregnum and transition periods.
const SPECIAL_CODES: [f64; 3] = [-66.0, -77.0, -88.0];

const AUTHORITY_COLUMNS: [&str; 12] = [
    "democ", "autoc", "polity", "xrreg", "xrcomp", "xropen", "xconst", "parreg", "parcomp", "exrec",
    "exconst", "polcomp",
];

/// Regime authority codings, one row per country-year.
pub struct PolityProfile;

impl SourceProfile for PolityProfile {
    fn source_id(&self) -> &'static str {
        POLITY
    }

    fn schema(&self) -> SourceSchema {
        let mut columns = declare(DeclaredType::Text, &["country", "scode"]);
        columns.extend(declare(DeclaredType::Integer, &["year", "polity2", "durable", "regtrans"]));
        columns.extend(declare(DeclaredType::Integer, &AUTHORITY_COLUMNS));

        SourceSchema {
            source_id: POLITY.to_string(),
            granularity: Granularity::CountryYear,
            keys: KeyColumns {
                name: "country".into(),
                code: "scode".into(),
                year: "year".into(),
            },
            sentinels: SentinelSet::default(),
            drop_columns: owned(&[
                "p5", "cyear", "ccode", "flag", "fragment", "prior", "emonth", "eday", "eyear",
                "eprec", "interim", "bmonth", "bday", "byear", "bprec", "post", "change", "d4",
                "d5", "sf",
            ]),
            columns,
            remaps: AUTHORITY_COLUMNS
                .iter()
                .map(|c| {
                    Remap::new(
                        c,
                        RemapRule::ToMissing {
                            values: SPECIAL_CODES.to_vec(),
                        },
                    )
                })
                .collect(),
            core_fields: owned(&["democ", "autoc", "polity", "polity2"]),
        }
    }

    /// `regime_transition` flags years with a regime transition code;
    /// `transition_within_year` also looks one year ahead for the same code.
    fn derive(&self, mut table: Table) -> Result<Table> {
        let column = |name: &str| {
            table.column_index(name).ok_or_else(|| PipelineError::UnknownColumn {
                source_id: POLITY.to_string(),
                column: name.to_string(),
            })
        };
        let (code_idx, year_idx, regtrans_idx) = (column("scode")?, column("year")?, column("regtrans")?);

        let flags: Vec<bool> = table
            .rows
            .iter()
            .map(|row| matches!(row[regtrans_idx].as_f64(), Some(x) if x != 0.0))
            .collect();

        let transitions: HashSet<(String, i64)> = table
            .rows
            .iter()
            .zip(&flags)
            .filter(|(_, flag)| **flag)
            .filter_map(|(row, _)| Some((row[code_idx].render(), row[year_idx].as_i64()?)))
            .collect();

        let ahead = table
            .rows
            .iter()
            .zip(&flags)
            .map(|(row, flag)| {
                let next = row[year_idx]
                    .as_i64()
                    .map(|y| transitions.contains(&(row[code_idx].render(), y + 1)))
                    .unwrap_or(false);
                Value::Bool(*flag || next)
            })
            .collect();

        table.push_column(
            Column::new("regime_transition", ColumnKind::Boolean),
            flags.into_iter().map(Value::Bool).collect(),
        );
        table.push_column(Column::new("transition_within_year", ColumnKind::Boolean), ahead);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SemanticType;

    fn table() -> Table {
        let columns = vec![
            Column::new("scode", ColumnKind::Text),
            Column::new("year", ColumnKind::Integer),
            Column::new("regtrans", ColumnKind::Integer),
        ];
        let row = |code: &str, year: i64, regtrans: Option<i64>| {
            vec![
                Value::text(code),
                Value::Int(year),
                regtrans.map(Value::Int).unwrap_or(Value::Missing(SemanticType::Numeric)),
            ]
        };
        Table::new("polity", columns).with_rows(vec![
            row("ZAI", 1996, None),
            row("ZAI", 1997, Some(-77)),
            row("ZAI", 1998, None),
            row("KEN", 1996, Some(0)),
            row("KEN", 1997, None),
        ])
    }

    #[test]
    fn test_transition_flags_look_one_year_ahead() {
        let t = PolityProfile.derive(table()).unwrap();
        let flag = |i: usize, c: &str| t.get(i, c).and_then(|v| v.as_bool()).unwrap();

        assert!(!flag(0, "regime_transition"));
        assert!(flag(0, "transition_within_year"));
        assert!(flag(1, "regime_transition"));
        assert!(flag(1, "transition_within_year"));
        assert!(!flag(2, "transition_within_year"));
        assert!(!flag(3, "regime_transition"));
        assert!(!flag(3, "transition_within_year"));
    }

    #[test]
    fn test_special_codes_become_missing() {
        let schema = PolityProfile.schema();
        let democ = schema.remaps.iter().find(|r| r.column == "democ").unwrap();
        let out = democ.rule.apply("democ", ColumnKind::Integer, Value::Int(-88)).unwrap();
        assert_eq!(out, Value::Missing(SemanticType::Numeric));
        let kept = democ.rule.apply("democ", ColumnKind::Integer, Value::Int(7)).unwrap();
        assert_eq!(kept, Value::Int(7));
    }
}
