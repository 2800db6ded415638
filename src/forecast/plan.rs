//! Per-granularity feature plan.
//!
//! The model's ordered feature list is classified once against the history
//! schema: calendar fields, lag features (base column + offset), and plain
//! columns copied from analogs. Synthesis then works from column indices and
//! never re-probes the schema by name.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::Granularity;
use crate::history::Schema;

/// Naming conventions of the feature tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConventions {
    pub hour_column: String,
    pub day_of_week_column: String,
    pub month_column: String,
    /// Separator between base name and offset, e.g. `daily_mean_cost_lag_7`
    pub lag_marker: String,
    /// Features that must never be zero or missing when handed to the model
    pub critical_features: Vec<String>,
}

impl Default for FeatureConventions {
    fn default() -> Self {
        Self {
            hour_column: "hour".to_string(),
            day_of_week_column: "dayofweek".to_string(),
            month_column: "month".to_string(),
            lag_marker: "_lag_".to_string(),
            critical_features: vec![
                "CAISO Total".to_string(),
                "Monthly_Price_Cents_per_kWh".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalField {
    Hour,
    DayOfWeek,
    Month,
}

/// "Value of `base` N periods ago"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LagFeature {
    pub base: String,
    pub offset: u32,
}

impl LagFeature {
    /// Parse `<base><marker><N>`; `None` when the name is not a lag feature
    pub fn parse(name: &str, marker: &str) -> Option<Self> {
        let (base, offset) = name.split_once(marker)?;
        if base.is_empty() {
            return None;
        }
        let offset: u32 = offset.parse().ok()?;
        (offset > 0).then(|| Self {
            base: base.to_string(),
            offset,
        })
    }

    pub fn name(&self, marker: &str) -> String {
        format!("{}{}{}", self.base, marker, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Temporal(TemporalField),
    Lag {
        lag: LagFeature,
        base_column: Option<usize>,
    },
    Plain,
}

/// One named input slot of the model
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSlot {
    pub name: String,
    pub kind: SlotKind,
    /// Column of the same name in the history, if any
    pub column: Option<usize>,
    pub critical: bool,
}

impl FeatureSlot {
    /// Whether any history column can ever supply this slot
    pub fn has_source(&self) -> bool {
        match &self.kind {
            SlotKind::Temporal(_) => true,
            SlotKind::Lag { base_column, .. } => self.column.is_some() || base_column.is_some(),
            SlotKind::Plain => self.column.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlan {
    granularity: Granularity,
    slots: Vec<FeatureSlot>,
    target_column: Option<usize>,
}

impl FeaturePlan {
    pub fn resolve(
        granularity: Granularity,
        features: &[String],
        schema: &Schema,
        target: &str,
        conventions: &FeatureConventions,
    ) -> Self {
        let slots: Vec<FeatureSlot> = features
            .iter()
            .map(|name| {
                let kind = if *name == conventions.hour_column {
                    SlotKind::Temporal(TemporalField::Hour)
                } else if *name == conventions.day_of_week_column {
                    SlotKind::Temporal(TemporalField::DayOfWeek)
                } else if *name == conventions.month_column {
                    SlotKind::Temporal(TemporalField::Month)
                } else if let Some(lag) = LagFeature::parse(name, &conventions.lag_marker) {
                    let base_column = schema.index_of(&lag.base);
                    SlotKind::Lag { lag, base_column }
                } else {
                    SlotKind::Plain
                };
                FeatureSlot {
                    name: name.clone(),
                    kind,
                    column: schema.index_of(name),
                    critical: conventions.critical_features.iter().any(|c| c == name),
                }
            })
            .collect();

        let plan = Self {
            granularity,
            slots,
            target_column: schema.index_of(target),
        };

        let missing = plan.unresolvable();
        if !missing.is_empty() {
            warn!(
                %granularity,
                features = ?missing,
                "model features have no source column in history"
            );
        }
        if plan.target_column.is_none() {
            warn!(%granularity, target, "target column missing from history");
        }
        plan
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn target_column(&self) -> Option<usize> {
        self.target_column
    }

    /// Column holding the `hour` aggregate, if the model uses it
    pub fn hour_column(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.kind == SlotKind::Temporal(TemporalField::Hour))
            .and_then(|s| s.column)
    }

    /// Slots no history column can supply
    pub fn unresolvable(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| !s.has_source())
            .map(|s| s.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("daily_mean_cost_lag_7", Some(("daily_mean_cost", 7)))]
    #[case("CAISO Total_lag_1", Some(("CAISO Total", 1)))]
    #[case("price_lag_x", None)]
    #[case("price_lag_0", None)]
    #[case("_lag_3", None)]
    #[case("price", None)]
    fn test_lag_feature_parse(#[case] name: &str, #[case] expected: Option<(&str, u32)>) {
        let parsed = LagFeature::parse(name, "_lag_");
        assert_eq!(
            parsed.as_ref().map(|l| (l.base.as_str(), l.offset)),
            expected
        );
        if let Some(lag) = parsed {
            assert_eq!(lag.name("_lag_"), name);
        }
    }

    #[test]
    fn test_plan_classifies_slots() {
        let schema = Schema::new(
            ["cost", "hour", "CAISO Total", "CAISO Total_lag_1", "temp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        let features: Vec<String> = ["month", "CAISO Total_lag_1", "CAISO Total", "humidity", "cost_lag_24"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let plan = FeaturePlan::resolve(
            Granularity::Hour,
            &features,
            &schema,
            "cost",
            &FeatureConventions::default(),
        );

        let slots = plan.slots();
        assert_eq!(slots[0].kind, SlotKind::Temporal(TemporalField::Month));
        assert!(matches!(
            &slots[1].kind,
            SlotKind::Lag { lag, base_column: Some(2) } if lag.offset == 1
        ));
        assert_eq!(slots[1].column, Some(3));
        assert!(slots[2].critical);
        assert_eq!(slots[2].kind, SlotKind::Plain);
        assert!(matches!(
            &slots[4].kind,
            SlotKind::Lag { base_column: Some(0), .. }
        ));
        assert_eq!(plan.unresolvable(), vec!["humidity"]);
        assert_eq!(plan.target_column(), Some(0));
        assert_eq!(plan.hour_column(), None);
    }
}
