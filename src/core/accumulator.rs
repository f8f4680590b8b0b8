//! Append-only accumulator filled by the pipeline modules.
//!
//! Every list is private and only grows through the `add_*` methods, so a
//! module can read what earlier modules produced but never edit or drop it.
//! Each entry carries the id of the module that produced it, which together
//! with `activated_modules` makes the final context a complete audit trail.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type EntryMetadata = BTreeMap<String, Value>;

/// Metadata keys shared between modules.
pub mod keys {
    pub const MOVING_DATE: &str = "movingDate";
    pub const DAYS_UNTIL_MOVE: &str = "daysUntilMove";
    pub const MOVING_WEEKDAY: &str = "movingWeekday";
    pub const IS_WEEKEND: &str = "isWeekend";
    pub const MOVING_MONTH: &str = "movingMonth";
    pub const BASE_VOLUME: &str = "baseVolume";
    pub const VOLUME_SOURCE: &str = "volumeSource";
    pub const ADJUSTED_VOLUME: &str = "adjustedVolume";
    pub const VOLUME_CONFIDENCE: &str = "volumeConfidence";
    pub const DISTANCE_KM: &str = "distanceKm";
    pub const DISTANCE_SOURCE: &str = "distanceSource";
    pub const VEHICLE_COUNT: &str = "vehicleCount";
    pub const VEHICLES: &str = "vehicles";
    pub const WORKERS_COUNT: &str = "workersCount";
    pub const LABOR_HOURS: &str = "laborHours";
    pub const RISK_SCORE: &str = "riskScore";
    pub const RISK_LEVEL: &str = "riskLevel";
    pub const SUBTOTAL: &str = "subtotal";
    pub const COST_LINE_COUNT: &str = "costLineCount";
    pub const CATEGORY_TOTALS: &str = "categoryTotals";
}

/// Rounds a euro amount to the cent.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostCategory {
    Labor,
    Vehicle,
    Transport,
    Access,
    Equipment,
    Surcharge,
    Discount,
    Insurance,
    Fee,
    Service,
    Supplies,
    Margin,
    Adjustment,
}

impl CostCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CostCategory::Labor => "LABOR",
            CostCategory::Vehicle => "VEHICLE",
            CostCategory::Transport => "TRANSPORT",
            CostCategory::Access => "ACCESS",
            CostCategory::Equipment => "EQUIPMENT",
            CostCategory::Surcharge => "SURCHARGE",
            CostCategory::Discount => "DISCOUNT",
            CostCategory::Insurance => "INSURANCE",
            CostCategory::Fee => "FEE",
            CostCategory::Service => "SERVICE",
            CostCategory::Supplies => "SUPPLIES",
            CostCategory::Margin => "MARGIN",
            CostCategory::Adjustment => "ADJUSTMENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub module_id: String,
    pub category: CostCategory,
    pub label: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: EntryMetadata,
}

impl CostEntry {
    pub fn new(module_id: &str, category: CostCategory, label: impl Into<String>, amount: f64) -> Self {
        Self {
            module_id: module_id.to_string(),
            category,
            label: label.into(),
            amount: round_currency(amount),
            metadata: EntryMetadata::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskContribution {
    pub module_id: String,
    pub amount: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: EntryMetadata,
}

impl RiskContribution {
    pub fn new(module_id: &str, amount: f64, reason: impl Into<String>) -> Self {
        Self {
            module_id: module_id.to_string(),
            amount,
            reason: reason.into(),
            metadata: EntryMetadata::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A change applied to an input value, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub module_id: String,
    pub field: String,
    pub from: f64,
    pub to: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalImpact {
    pub module_id: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceNote {
    pub module_id: String,
    pub message: String,
    pub coverage_amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementKind {
    Personnel,
    Equipment,
    Authorization,
    Documentation,
    Preparation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub module_id: String,
    pub kind: RequirementKind,
    pub description: String,
    pub mandatory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossSellProposal {
    pub module_id: String,
    pub service: String,
    pub label: String,
    pub estimated_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalFlag {
    pub module_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedContext {
    costs: Vec<CostEntry>,
    risk_contributions: Vec<RiskContribution>,
    adjustments: Vec<Adjustment>,
    legal_impacts: Vec<LegalImpact>,
    insurance_notes: Vec<InsuranceNote>,
    requirements: Vec<Requirement>,
    cross_sell_proposals: Vec<CrossSellProposal>,
    operational_flags: Vec<OperationalFlag>,
    activated_modules: Vec<String>,
    metadata: BTreeMap<String, Value>,
}

impl ComputedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn costs(&self) -> &[CostEntry] {
        &self.costs
    }

    pub fn risk_contributions(&self) -> &[RiskContribution] {
        &self.risk_contributions
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn legal_impacts(&self) -> &[LegalImpact] {
        &self.legal_impacts
    }

    pub fn insurance_notes(&self) -> &[InsuranceNote] {
        &self.insurance_notes
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn cross_sell_proposals(&self) -> &[CrossSellProposal] {
        &self.cross_sell_proposals
    }

    pub fn operational_flags(&self) -> &[OperationalFlag] {
        &self.operational_flags
    }

    pub fn activated_modules(&self) -> &[String] {
        &self.activated_modules
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn is_activated(&self, module_id: &str) -> bool {
        self.activated_modules.iter().any(|id| id == module_id)
    }

    pub fn add_cost(&mut self, entry: CostEntry) {
        self.costs.push(entry);
    }

    pub fn add_risk(&mut self, contribution: RiskContribution) {
        self.risk_contributions.push(contribution);
    }

    pub fn add_adjustment(&mut self, module_id: &str, field: &str, from: f64, to: f64, reason: impl Into<String>) {
        self.adjustments.push(Adjustment {
            module_id: module_id.to_string(),
            field: field.to_string(),
            from,
            to,
            reason: reason.into(),
        });
    }

    pub fn add_legal_impact(&mut self, module_id: &str, severity: Severity, message: impl Into<String>) {
        self.legal_impacts.push(LegalImpact {
            module_id: module_id.to_string(),
            severity,
            message: message.into(),
        });
    }

    pub fn add_insurance_note(&mut self, module_id: &str, message: impl Into<String>, coverage_amount: Option<f64>) {
        self.insurance_notes.push(InsuranceNote {
            module_id: module_id.to_string(),
            message: message.into(),
            coverage_amount: coverage_amount.map(round_currency),
        });
    }

    pub fn add_requirement(
        &mut self,
        module_id: &str,
        kind: RequirementKind,
        description: impl Into<String>,
        mandatory: bool,
    ) {
        self.requirements.push(Requirement {
            module_id: module_id.to_string(),
            kind,
            description: description.into(),
            mandatory,
        });
    }

    pub fn add_cross_sell(&mut self, module_id: &str, service: &str, label: impl Into<String>, estimated_price: f64) {
        self.cross_sell_proposals.push(CrossSellProposal {
            module_id: module_id.to_string(),
            service: service.to_string(),
            label: label.into(),
            estimated_price: round_currency(estimated_price),
        });
    }

    pub fn add_flag(&mut self, module_id: &str, code: &str, message: impl Into<String>) {
        self.operational_flags.push(OperationalFlag {
            module_id: module_id.to_string(),
            code: code.to_string(),
            message: message.into(),
        });
    }

    /// Records that `module_id` ran. Called once by each module that contributes.
    pub fn activate(&mut self, module_id: &str) {
        self.activated_modules.push(module_id.to_string());
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }

    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn has_flag(&self, code: &str) -> bool {
        self.operational_flags.iter().any(|f| f.code == code)
    }

    /// Sum of every cost entry so far, rounded to the cent.
    pub fn total_cost(&self) -> f64 {
        round_currency(self.costs.iter().map(|c| c.amount).sum())
    }

    pub fn total_for(&self, categories: &[CostCategory]) -> f64 {
        round_currency(
            self.costs
                .iter()
                .filter(|c| categories.contains(&c.category))
                .map(|c| c.amount)
                .sum(),
        )
    }

    pub fn category_totals(&self) -> BTreeMap<CostCategory, f64> {
        let mut totals = BTreeMap::new();
        for cost in &self.costs {
            *totals.entry(cost.category).or_insert(0.0) += cost.amount;
        }
        for total in totals.values_mut() {
            *total = round_currency(*total);
        }
        totals
    }

    pub fn total_risk(&self) -> f64 {
        self.risk_contributions.iter().map(|r| r.amount).sum()
    }

    /// Entries produced by one module across every list, used to audit provenance.
    pub fn entries_from(&self, module_id: &str) -> usize {
        self.costs.iter().filter(|e| e.module_id == module_id).count()
            + self.risk_contributions.iter().filter(|e| e.module_id == module_id).count()
            + self.adjustments.iter().filter(|e| e.module_id == module_id).count()
            + self.legal_impacts.iter().filter(|e| e.module_id == module_id).count()
            + self.insurance_notes.iter().filter(|e| e.module_id == module_id).count()
            + self.requirements.iter().filter(|e| e.module_id == module_id).count()
            + self.cross_sell_proposals.iter().filter(|e| e.module_id == module_id).count()
            + self.operational_flags.iter().filter(|e| e.module_id == module_id).count()
    }

    /// True when every list of `earlier` is an unchanged prefix of the same list here.
    pub(crate) fn extends(&self, earlier: &ComputedContext) -> bool {
        self.costs.starts_with(&earlier.costs)
            && self.risk_contributions.starts_with(&earlier.risk_contributions)
            && self.adjustments.starts_with(&earlier.adjustments)
            && self.legal_impacts.starts_with(&earlier.legal_impacts)
            && self.insurance_notes.starts_with(&earlier.insurance_notes)
            && self.requirements.starts_with(&earlier.requirements)
            && self.cross_sell_proposals.starts_with(&earlier.cross_sell_proposals)
            && self.operational_flags.starts_with(&earlier.operational_flags)
            && self.activated_modules.starts_with(&earlier.activated_modules)
    }

    pub(crate) fn sizes(&self) -> AccumulatorSizes {
        AccumulatorSizes {
            contributions: [
                self.costs.len(),
                self.risk_contributions.len(),
                self.adjustments.len(),
                self.legal_impacts.len(),
                self.insurance_notes.len(),
                self.requirements.len(),
                self.cross_sell_proposals.len(),
                self.operational_flags.len(),
            ],
            activated: self.activated_modules.len(),
        }
    }
}

/// List lengths captured before a module runs, compared afterwards by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AccumulatorSizes {
    pub contributions: [usize; 8],
    pub activated: usize,
}

impl AccumulatorSizes {
    pub fn grew_since(&self, before: &AccumulatorSizes) -> bool {
        self.contributions != before.contributions
    }

    pub fn costs(&self) -> usize {
        self.contributions[0]
    }
}
