//! Gate reports shared by the asset and production QA gates.
//!
//! Invariant for every report: `gate_result` is `rejected` iff at least one
//! check has `result = fail`. Reports are built through [`gate_result_for`] so
//! the invariant holds by construction; `validate` re-checks it on read.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{first_n, master::ProbeSummary};
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GateResult {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Approved,
    ReviewRequired,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QaCheck {
    pub check_id: String,
    pub check_type: String,
    pub result: CheckResult,
    pub message: String,
}

impl QaCheck {
    pub fn new(
        check_id: impl Into<String>,
        check_type: impl Into<String>,
        result: CheckResult,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            check_type: check_type.into(),
            result,
            message: message.into(),
        }
    }

    pub fn pass(id: &str, check_type: &str, message: impl Into<String>) -> Self {
        Self::new(id, check_type, CheckResult::Pass, message)
    }

    pub fn fail(id: &str, check_type: &str, message: impl Into<String>) -> Self {
        Self::new(id, check_type, CheckResult::Fail, message)
    }

    pub fn warn(id: &str, check_type: &str, message: impl Into<String>) -> Self {
        Self::new(id, check_type, CheckResult::Warn, message)
    }
}

pub fn count_results(checks: &[QaCheck], result: CheckResult) -> usize {
    checks.iter().filter(|c| c.result == result).count()
}

pub fn gate_result_for(checks: &[QaCheck]) -> GateResult {
    if count_results(checks, CheckResult::Fail) > 0 {
        GateResult::Rejected
    } else {
        GateResult::Approved
    }
}

/// `blocked` on any failure, `review_required` when warnings exceed the
/// allowance, otherwise `approved`.
pub fn gate_status_for(checks: &[QaCheck], max_warnings: usize) -> GateStatus {
    if count_results(checks, CheckResult::Fail) > 0 {
        GateStatus::Blocked
    } else if count_results(checks, CheckResult::Warn) > max_warnings {
        GateStatus::ReviewRequired
    } else {
        GateStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetQaReport {
    pub brief_id: String,
    pub script_id: String,
    pub checks: Vec<QaCheck>,
    pub gate_result: GateResult,
    pub gate_status: GateStatus,
}

impl AssetQaReport {
    pub fn from_checks(
        brief_id: impl Into<String>,
        script_id: impl Into<String>,
        checks: Vec<QaCheck>,
        max_warnings: usize,
    ) -> Self {
        Self {
            brief_id: brief_id.into(),
            script_id: script_id.into(),
            gate_result: gate_result_for(&checks),
            gate_status: gate_status_for(&checks, max_warnings),
            checks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetQaBatch {
    pub max_warnings: usize,
    pub reports: Vec<AssetQaReport>,
}

impl AssetQaBatch {
    pub fn approved(&self) -> impl Iterator<Item = &AssetQaReport> {
        self.reports
            .iter()
            .filter(|r| r.gate_status == GateStatus::Approved)
    }
}

impl ArtifactPayload for AssetQaBatch {
    const KIND: ArtifactKind = ArtifactKind::AssetQa;

    fn count(&self) -> usize {
        self.reports.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for report in &self.reports {
            if report.gate_result != gate_result_for(&report.checks)
                || report.gate_status != gate_status_for(&report.checks, self.max_warnings)
            {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("gate verdict for {} disagrees with checks", report.brief_id),
                ));
            }
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "reports": self.reports.len(),
            "approved": self.approved().count(),
            "blocked": self.reports.iter().filter(|r| r.gate_status == GateStatus::Blocked).count(),
            "approved_briefs": first_n(self.approved().map(|r| r.brief_id.as_str())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductionQaReport {
    pub master_id: String,
    pub master_path: String,
    pub checks: Vec<QaCheck>,
    pub gate_result: GateResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeSummary>,
}

impl ProductionQaReport {
    pub fn from_checks(
        master_id: impl Into<String>,
        master_path: impl Into<String>,
        checks: Vec<QaCheck>,
        probe: Option<ProbeSummary>,
    ) -> Self {
        Self {
            master_id: master_id.into(),
            master_path: master_path.into(),
            gate_result: gate_result_for(&checks),
            checks,
            probe,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductionQaBatch {
    pub reports: Vec<ProductionQaReport>,
}

impl ProductionQaBatch {
    pub fn approved(&self) -> impl Iterator<Item = &ProductionQaReport> {
        self.reports
            .iter()
            .filter(|r| r.gate_result == GateResult::Approved)
    }
}

impl ArtifactPayload for ProductionQaBatch {
    const KIND: ArtifactKind = ArtifactKind::ProductionQa;

    fn count(&self) -> usize {
        self.reports.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for report in &self.reports {
            if report.gate_result != gate_result_for(&report.checks) {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("gate_result for {} disagrees with checks", report.master_id),
                ));
            }
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "reports": self.reports.len(),
            "approved": self.approved().count(),
            "approved_masters": first_n(self.approved().map(|r| r.master_id.as_str())),
        })
    }
}
