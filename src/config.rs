//! Pipeline configuration: schema, derivations, filter and charts.
//!
//! Configurations are YAML documents. Without one, the built-in employee
//! pipeline from [`PipelineConfig::employees`] is used.
//!
//! ```yaml
//! schema:
//!   columns:
//!     - { name: salary, type: integer }
//!     - { name: hire date, type: date }
//! derive:
//!   - name: high salary
//!     strategy: threshold-compare
//!     threshold: { column: salary, threshold: 7000 }
//!   - name: vacation days
//!     tenure: { column: hire date }
//! filter:
//!   conditions: ["high salary == yes"]
//! charts:
//!   - title: Salary by employee
//!     bar: { x: name, y: salary }
//! ```

use std::{fs::File, io::BufReader, path::Path};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    chart::{ChartSpec, ColorBy, ColorStrategy, PaletteEntry},
    derive::{DerivationRule, Strategy, TenureRule, ThresholdRule, Tier},
    error::{Error, Result},
    filter::FilterPredicate,
    schema::Schema,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub schema: Schema,
    /// Reference date for tenure and `as_of` in expressions; today when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub derive: Vec<RuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(flatten)]
    pub computation: ComputationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputationConfig {
    Threshold(ThresholdRule),
    Tenure(TenureConfig),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenureConfig {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<Tier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartSource {
    /// Every loaded row, after derivation.
    #[default]
    All,
    /// Only rows kept by the filter.
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub source: ChartSource,
    #[serde(flatten)]
    pub spec: ChartSpec,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|err| Error::Config(format!("Opening pipeline config {path:?}: {err}")))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| Error::Config(format!("Parsing pipeline config {path:?}: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)
            .map_err(|err| Error::Config(format!("Parsing pipeline config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|err| Error::Config(format!("Serializing pipeline config: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.ensure_unique()?;
        for rule in &self.derive {
            if rule.name.trim().is_empty() {
                return Err(Error::Config("Derived column is missing a name".to_string()));
            }
            let threshold_only = matches!(
                rule.strategy,
                Some(Strategy::ThresholdCompare | Strategy::Comprehension)
            );
            if threshold_only && !matches!(rule.computation, ComputationConfig::Threshold(_)) {
                return Err(Error::Config(format!(
                    "Derived column '{}' uses strategy {} which only applies to threshold rules",
                    rule.name,
                    rule.strategy.unwrap_or(Strategy::RowFunction)
                )));
            }
        }
        if let Some(filter) = &self.filter
            && !filter.conditions.is_empty()
            && filter.expression.is_some()
        {
            return Err(Error::Config(
                "Filter takes either conditions or an expression, not both".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolve_as_of(&self, overridden: Option<NaiveDate>) -> NaiveDate {
        overridden
            .or(self.as_of)
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn rules(&self, as_of: NaiveDate) -> Vec<DerivationRule> {
        self.derive
            .iter()
            .map(|rule| {
                let built = match &rule.computation {
                    ComputationConfig::Threshold(threshold) => DerivationRule::threshold(
                        rule.name.clone(),
                        threshold.clone(),
                        Strategy::ThresholdCompare,
                    ),
                    ComputationConfig::Tenure(tenure) => {
                        let tenure_rule = match &tenure.tiers {
                            Some(tiers) => TenureRule::new(
                                tenure.column.clone(),
                                as_of,
                                tiers.clone(),
                                tenure.default.unwrap_or(0),
                            ),
                            None => TenureRule::vacation_days(tenure.column.clone(), as_of),
                        };
                        DerivationRule::tenure(rule.name.clone(), tenure_rule)
                    }
                    ComputationConfig::Expression(expression) => {
                        DerivationRule::expression(rule.name.clone(), expression.clone(), as_of)
                    }
                };
                match rule.strategy {
                    Some(strategy) => built.with_strategy(strategy),
                    None => built,
                }
            })
            .collect()
    }

    pub fn predicate(&self, as_of: NaiveDate) -> Result<Option<FilterPredicate>> {
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        if let Some(expression) = &filter.expression {
            return Ok(Some(FilterPredicate::Expression {
                expression: expression.clone(),
                as_of,
            }));
        }
        if filter.conditions.is_empty() {
            return Ok(None);
        }
        FilterPredicate::parse(&filter.conditions).map(Some)
    }

    /// The employee enrichment: salary classification, tiered vacation days,
    /// high earners filter, and four charts.
    pub fn employees() -> Self {
        let salary_colors = ColorBy::new(
            "high salary",
            vec![
                PaletteEntry::new("yes", "#2ca02c"),
                PaletteEntry::new("no", "#d62728"),
            ],
        );
        Self {
            schema: Schema::employees(),
            as_of: None,
            derive: vec![
                RuleConfig {
                    name: "high salary".to_string(),
                    strategy: Some(Strategy::ThresholdCompare),
                    computation: ComputationConfig::Threshold(ThresholdRule::new("salary", 7000.0)),
                },
                RuleConfig {
                    name: "vacation days".to_string(),
                    strategy: Some(Strategy::RowFunction),
                    computation: ComputationConfig::Tenure(TenureConfig {
                        column: "hire date".to_string(),
                        tiers: None,
                        default: None,
                    }),
                },
            ],
            filter: Some(FilterConfig {
                conditions: vec!["high salary == yes".to_string()],
                expression: None,
            }),
            charts: vec![
                ChartConfig {
                    source: ChartSource::All,
                    spec: ChartSpec::bar("Salary by employee", "name", "salary"),
                },
                ChartConfig {
                    source: ChartSource::All,
                    spec: ChartSpec::bar("Salary by employee, high earners", "name", "salary")
                        .colored_by(salary_colors.clone()),
                },
                ChartConfig {
                    source: ChartSource::Filtered,
                    spec: ChartSpec::bar("Vacation days of high earners", "name", "vacation days")
                        .colored_by(salary_colors.clone().with_strategy(ColorStrategy::Conditional)),
                },
                ChartConfig {
                    source: ChartSource::All,
                    spec: ChartSpec::pair(
                        "Salary, tenure and vacation days",
                        ["salary", "hire date", "vacation days"],
                        "high salary",
                    )
                    .colored_by(salary_colors),
                },
            ],
        }
    }
}
