use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{declare, owned, SourceProfile};
use crate::constants::MASS_MOBILIZATION;
use crate::domain::{Column, ColumnKind, SemanticType, Table, Value};
use crate::error::Result;
use crate::pipeline::processing::schema::{
    DeclaredType, Granularity, KeyColumns, OrdinalLevel, Remap, RemapRule, SourceSchema,
};
use crate::pipeline::processing::sentinel::SentinelSet;

/// First number in a free-text crowd size, with an optional scale word.
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(thousand|million|k\b|m\b)?").expect("static regex")
});

/// Crowd sizes written only in words, checked in order.
const WORD_ESTIMATES: [(&str, i64); 7] = [
    ("hundreds of thousands", 100_000),
    ("tens of thousands", 10_000),
    ("half a million", 500_000),
    ("million", 1_000_000),
    ("thousand", 1_000),
    ("hundred", 100),
    ("dozen", 12),
];

/// Protest events, one row per protest.
pub struct MassMobilizationProfile;

const START: [&str; 3] = ["startyear", "startmonth", "startday"];
const END: [&str; 3] = ["endyear", "endmonth", "endday"];

impl SourceProfile for MassMobilizationProfile {
    fn source_id(&self) -> &'static str {
        MASS_MOBILIZATION
    }

    fn schema(&self) -> SourceSchema {
        let mut columns = declare(DeclaredType::Text, &["country", "ccode"]);
        columns.extend(declare(
            DeclaredType::Integer,
            &[
                "id",
                "year",
                "protest",
                "protestnumber",
                "startday",
                "startmonth",
                "startyear",
                "endday",
                "endmonth",
                "endyear",
            ],
        ));
        columns.extend(declare(DeclaredType::Boolean, &["protesterviolence"]));
        columns.extend(declare(
            DeclaredType::Text,
            &[
                "region",
                "participants_category",
                "participants",
                "protesterdemand1",
                "stateresponse1",
            ],
        ));

        let levels = [
            ("50-99", 1),
            ("100-999", 2),
            ("1000-1999", 3),
            ("2000-4999", 4),
            ("5000-10000", 5),
            (">10000", 6),
        ]
        .iter()
        .map(|(label, score)| OrdinalLevel {
            label: label.to_string(),
            score: *score,
        })
        .collect();

        SourceSchema {
            source_id: MASS_MOBILIZATION.to_string(),
            granularity: Granularity::Event,
            keys: KeyColumns {
                name: "country".into(),
                code: "ccode".into(),
                year: "year".into(),
            },
            sentinels: SentinelSet {
                numeric: vec![-999.0],
                text: owned(&["", ".", "NA", "-999"]),
            },
            drop_columns: owned(&[
                "location",
                "protesteridentity",
                "sources",
                "notes",
                "protesterdemand2",
                "protesterdemand3",
                "protesterdemand4",
                "stateresponse2",
                "stateresponse3",
                "stateresponse4",
                "stateresponse5",
                "stateresponse6",
                "stateresponse7",
            ]),
            columns,
            remaps: vec![
                Remap::new(
                    "participants_category",
                    RemapRule::Ordinal {
                        levels,
                        fallback: Default::default(),
                    },
                ),
                Remap::new(
                    "stateresponse1",
                    RemapRule::Rename {
                        from: "accomodation".into(),
                        to: "accommodation".into(),
                    },
                ),
            ],
            core_fields: owned(&START),
        }
    }

    fn derive(&self, mut table: Table) -> Result<Table> {
        let start = date_columns(&table, &START);
        let end = date_columns(&table, &END);
        let durations = table
            .rows
            .iter()
            .map(|row| {
                let from = start.and_then(|idx| date_of(row, idx));
                let to = end.and_then(|idx| date_of(row, idx));
                match (from, to) {
                    (Some(from), Some(to)) if to >= from => Value::Int((to - from).num_days() + 1),
                    _ => Value::Missing(SemanticType::Numeric),
                }
            })
            .collect();
        table.push_column(Column::new("duration_days", ColumnKind::Integer), durations);

        let estimates = match table.column_index("participants") {
            Some(idx) => table.rows.iter().map(|row| participants_estimate(&row[idx])).collect(),
            None => vec![Value::Missing(SemanticType::Numeric); table.len()],
        };
        table.push_column(Column::new("participants_estimate", ColumnKind::Integer), estimates);
        Ok(table)
    }
}

fn date_columns(table: &Table, names: &[&str; 3]) -> Option<[usize; 3]> {
    Some([
        table.column_index(names[0])?,
        table.column_index(names[1])?,
        table.column_index(names[2])?,
    ])
}

fn date_of(row: &[Value], [y, m, d]: [usize; 3]) -> Option<NaiveDate> {
    let year = i32::try_from(row[y].as_i64()?).ok()?;
    let month = u32::try_from(row[m].as_i64()?).ok()?;
    let day = u32::try_from(row[d].as_i64()?).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Numeric crowd size from the free-text `participants` field.
pub fn participants_estimate(value: &Value) -> Value {
    let missing = Value::Missing(SemanticType::Numeric);
    let text = match value {
        Value::Text(s) => s.to_lowercase(),
        Value::Int(i) => return Value::Int(*i),
        Value::Float(f) => return Value::Int(f.round() as i64),
        _ => return missing,
    };

    if let Some(caps) = NUMBER.captures(&text) {
        let number: String = caps[1].chars().filter(|c| *c != ',').collect();
        let scale = match caps.get(2).map(|m| m.as_str()) {
            Some("thousand") | Some("k") => 1_000.0,
            Some("million") | Some("m") => 1_000_000.0,
            _ => 1.0,
        };
        return match number.parse::<f64>() {
            Ok(n) => Value::Int((n * scale).round() as i64),
            Err(_) => missing,
        };
    }
    WORD_ESTIMATES
        .iter()
        .find(|(word, _)| text.contains(word))
        .map_or(missing, |(_, n)| Value::Int(*n))
}
