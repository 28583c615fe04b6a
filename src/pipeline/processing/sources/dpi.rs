use super::{declare, owned, SourceProfile};
use crate::constants::DPI;
use crate::pipeline::processing::schema::{
    DeclaredType, Fallback, Granularity, KeyColumns, OrdinalLevel, Remap, RemapRule, SourceSchema,
};
use crate::pipeline::processing::sentinel::SentinelSet;

/// Political institution indicators, one row per country-year.
pub struct DpiProfile;

const BOOLEAN_COLUMNS: [&str; 8] = [
    "finittrm", "military", "defmin", "multpl", "execnat", "allhouse", "pluralty", "pr",
];

/// Party-level detail, election dates and strict/lax variants of the kept
/// indices.
const DROPPED: &[&str] = &[
    "prtyin", "execme", "execrurl", "execreg", "execage", "execspec", "nonchief",
    "gov1me", "gov1seat", "gov1vote", "gov1nat", "gov1rlc", "gov1rurl", "gov1reg", "gov1age",
    "gov2me", "gov2seat", "gov2vote", "gov2nat", "gov2rlc", "gov2rurl", "gov2reg", "gov2age",
    "gov3me", "gov3seat", "gov3vote", "gov3nat", "gov3rlc", "gov3rurl", "gov3reg", "gov3age",
    "govoth", "govothst", "govothvt",
    "opp1me", "opp1seat", "opp1vote", "opp1nat", "opp1rlc", "opp1rurl", "opp1reg", "opp1age",
    "opp2me", "opp2seat", "opp2vote", "opp3me", "opp3seat", "opp3vote",
    "oppoth", "oppothst", "oppothvt", "ulprty", "numul", "ulprtyst", "numvote", "oppvote",
    "maj", "partyage", "partyname", "numgov", "numopp",
    "tensys_strict", "tensys", "checks_lax", "stabs_strict", "stabns_strict", "stabns",
    "tenlong_strict", "tenshort_strict",
    "mdmh", "ssh", "sensys", "thresh", "dhondt", "cl", "select", "fraud", "author", "stconst",
    "dateleg", "dateexec", "legelec", "exelec", "gq", "gqi", "reelect", "countrycode",
];

impl SourceProfile for DpiProfile {
    fn source_id(&self) -> &'static str {
        DPI
    }

    fn schema(&self) -> SourceSchema {
        let mut columns = declare(DeclaredType::Text, &["countryname", "ifs", "system", "execrlc"]);
        columns.extend(declare(DeclaredType::YearFromDate, &["year"]));
        columns.extend(declare(DeclaredType::Boolean, &BOOLEAN_COLUMNS));
        columns.extend(declare(DeclaredType::Text, &["housesys"]));
        columns.extend(declare(
            DeclaredType::Float,
            &[
                "yrsoffc", "yrcurnt", "percent1", "percentl", "totalseats", "govfrac", "oppfrac",
                "herfgov", "herfopp", "frac", "liec", "eiec", "checks", "stabs", "tenlong",
                "tenshort",
            ],
        ));
        columns.extend(declare(DeclaredType::Integer, &["polariz", "auton", "muni", "state"]));

        let execrlc = ["Left", "Center", "Right"]
            .iter()
            .zip(1..)
            .map(|(label, score)| OrdinalLevel {
                label: label.to_string(),
                score,
            })
            .collect();

        SourceSchema {
            source_id: DPI.to_string(),
            granularity: Granularity::CountryYear,
            keys: KeyColumns {
                name: "countryname".into(),
                code: "ifs".into(),
                year: "year".into(),
            },
            sentinels: SentinelSet {
                numeric: vec![-999.0],
                text: owned(&["-999", "NA", ""]),
            },
            drop_columns: owned(DROPPED),
            columns,
            remaps: vec![
                Remap::new(
                    "system",
                    RemapRule::Boolean {
                        truthy: owned(&["Presidential"]),
                        falsy: owned(&["Assembly-elected President", "Parliamentary"]),
                        fallback: Fallback::Missing,
                    },
                ),
                Remap::new(
                    "execrlc",
                    RemapRule::Ordinal {
                        levels: execrlc,
                        fallback: Fallback::Missing,
                    },
                ),
                Remap::new(
                    "housesys",
                    RemapRule::Boolean {
                        truthy: owned(&["1", "Proportional"]),
                        falsy: owned(&["0", "Plurality"]),
                        fallback: Fallback::Missing,
                    },
                ),
                Remap::new("polariz", RemapRule::Range { min: 0.0, max: 2.0 }),
                Remap::new("liec", RemapRule::Range { min: 1.0, max: 7.0 }),
                Remap::new("eiec", RemapRule::Range { min: 1.0, max: 7.0 }),
            ],
            core_fields: owned(&["system", "execrlc", "yrsoffc", "percent1", "percentl", "totalseats"]),
        }
    }
}
