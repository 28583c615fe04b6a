use serde::{Deserialize, Serialize};

use crate::constants::IDENTITY_COLUMNS;

/// One declarative post-join derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FeatureStep {
    /// New column `into` = `last` if present, else `first`.
    Coalesce {
        first: String,
        last: String,
        into: String,
    },
    /// Rescale a `[0, 100]` column to `[0, 1]` in place.
    RescalePercent { column: String },
    /// New column `into` = `ln(1 + max(column, 0))`.
    Log1p { column: String, into: String },
    /// Move a boolean column into the target slot under a new name.
    Target { from: String, into: String },
}

impl FeatureStep {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureStep::Coalesce { .. } => "coalesce",
            FeatureStep::RescalePercent { .. } => "rescale_percent",
            FeatureStep::Log1p { .. } => "log1p",
            FeatureStep::Target { .. } => "target",
        }
    }
}

/// The contract handed to the modeling boundary: how features are derived
/// and which encoding bucket every analysis column belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    pub steps: Vec<FeatureStep>,
    pub binary: Vec<String>,
    pub continuous: Vec<String>,
    pub categorical: Vec<String>,
    pub target: String,
    /// Identity columns and step inputs removed before the analysis table.
    pub drop: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl FeatureCatalog {
    /// Every bucketed column in analysis-table order, target last.
    pub fn bucketed_columns(&self) -> Vec<&str> {
        self.binary
            .iter()
            .chain(&self.continuous)
            .chain(&self.categorical)
            .map(|s| s.as_str())
            .chain(std::iter::once(self.target.as_str()))
            .collect()
    }

    /// Catalog for the three built-in sources.
    pub fn builtin() -> Self {
        let mut drop = owned(&IDENTITY_COLUMNS);
        drop.extend(owned(&[
            // protest events
            "id",
            "protest",
            "protestnumber",
            "startday",
            "startmonth",
            "startyear",
            "endday",
            "endmonth",
            "endyear",
            "participants",
            "participants_estimate",
            "duration_days",
            // regime codings the target is derived from
            "regtrans",
            "regime_transition",
            // institutions
            "percent1",
            "percentl",
        ]));

        Self {
            steps: vec![
                FeatureStep::Coalesce {
                    first: "percent1".into(),
                    last: "percentl".into(),
                    into: "percent".into(),
                },
                FeatureStep::RescalePercent {
                    column: "percent".into(),
                },
                FeatureStep::Log1p {
                    column: "protestnumber".into(),
                    into: "protestnumber_log".into(),
                },
                FeatureStep::Log1p {
                    column: "participants_estimate".into(),
                    into: "participants_log".into(),
                },
                FeatureStep::Log1p {
                    column: "duration_days".into(),
                    into: "duration_log".into(),
                },
                FeatureStep::Target {
                    from: "transition_within_year".into(),
                    into: "regime_change".into(),
                },
            ],
            binary: owned(&[
                "protesterviolence",
                "system",
                "finittrm",
                "multpl",
                "military",
                "defmin",
                "execnat",
                "allhouse",
                "pluralty",
                "pr",
                "housesys",
            ]),
            continuous: owned(&[
                "protestnumber_log",
                "participants_log",
                "duration_log",
                "participants_category",
                "democ",
                "autoc",
                "polity",
                "polity2",
                "durable",
                "yrsoffc",
                "yrcurnt",
                "percent",
                "execrlc",
                "totalseats",
                "govfrac",
                "oppfrac",
                "herfgov",
                "herfopp",
                "frac",
                "liec",
                "eiec",
                "checks",
                "stabs",
                "tenlong",
                "tenshort",
            ]),
            categorical: owned(&[
                "region",
                "protesterdemand1",
                "stateresponse1",
                "xrreg",
                "xrcomp",
                "xropen",
                "xconst",
                "parreg",
                "parcomp",
                "exrec",
                "exconst",
                "polcomp",
                "polariz",
                "auton",
                "muni",
                "state",
            ]),
            target: "regime_change".into(),
            drop,
        }
    }
}
