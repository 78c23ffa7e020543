//! Cluster API style status conditions
//!
//! Conditions follow the Cluster API v1beta1 contract: a `type`, a `status`
//! (`True`/`False`/`Unknown`), an optional `severity` for false conditions, a
//! machine-readable `reason` and a human-readable `message`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type: summary readiness of the object
pub const READY_CONDITION: &str = "Ready";
/// Condition type: VPC exists and is usable
pub const VPC_READY_CONDITION: &str = "VPCReady";
/// Condition type: cluster subnet exists with a public gateway attached
pub const SUBNET_READY_CONDITION: &str = "SubnetReady";
/// Condition type: control plane load balancer is active
pub const LOAD_BALANCER_READY_CONDITION: &str = "LoadBalancerReady";
/// Condition type: compute instance is running
pub const INSTANCE_READY_CONDITION: &str = "InstanceReady";
/// Condition type: image is active in the workspace
pub const IMAGE_READY_CONDITION: &str = "ImageReady";
/// Condition type: the COS import job finished successfully
pub const IMAGE_IMPORT_JOB_READY_CONDITION: &str = "ImageImportJobReady";

/// Reason: instance creation was rejected by IBM Cloud
pub const INSTANCE_PROVISION_FAILED_REASON: &str = "InstanceProvisionFailed";
/// Reason: instance exists but is still building
pub const INSTANCE_NOT_READY_REASON: &str = "InstanceNotReady";
/// Reason: instance is stopped
pub const INSTANCE_STOPPED_REASON: &str = "InstanceStopped";
/// Reason: instance is in an error state
pub const INSTANCE_ERRORED_REASON: &str = "InstanceErrored";
/// Reason: instance reported a state this provider does not know
pub const INSTANCE_STATE_UNKNOWN_REASON: &str = "InstanceStateUnknown";
/// Reason: owning cluster infrastructure is not ready yet
pub const WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON: &str = "WaitingForClusterInfrastructure";
/// Reason: bootstrap provider has not produced the data secret yet
pub const WAITING_FOR_BOOTSTRAP_DATA_REASON: &str = "WaitingForBootstrapData";
/// Reason: referenced IBMPowerVSImage is not ready yet
pub const WAITING_FOR_IBM_POWERVS_IMAGE_REASON: &str = "WaitingForIBMPowerVSImage";
/// Reason: image exists but is not active
pub const IMAGE_NOT_READY_REASON: &str = "ImageNotReady";
/// Reason: COS import job failed
pub const IMAGE_IMPORT_FAILED_REASON: &str = "ImageImportFailed";
/// Reason: COS import job is queued
pub const IMAGE_QUEUED_REASON: &str = "ImageQueued";
/// Reason: COS import job is running
pub const IMAGE_IMPORT_RUNNING_REASON: &str = "ImageImportRunning";
/// Reason: image reconciliation failed for another reason
pub const IMAGE_RECONCILIATION_FAILED_REASON: &str = "ImageReconciliationFailed";
/// Reason: load balancer is still provisioning
pub const LOAD_BALANCER_NOT_READY_REASON: &str = "LoadBalancerNotReady";
/// Reason: a VPC or subnet call failed
pub const NETWORK_PROVISION_FAILED_REASON: &str = "NetworkProvisionFailed";
/// Reason: object is being deleted
pub const DELETING_REASON: &str = "Deleting";

/// Status of a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// The condition holds
    True,
    /// The condition does not hold
    False,
    /// The condition could not be evaluated
    #[default]
    Unknown,
}

/// Severity of a false condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionSeverity {
    /// Requires user attention
    Error,
    /// Unexpected but possibly transient
    Warning,
    /// Expected progress step
    Info,
    /// No severity (true or unknown conditions)
    #[default]
    #[serde(rename = "")]
    None,
}

/// Cluster API style condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "InstanceReady")
    #[serde(rename = "type")]
    pub type_: String,

    /// True, False or Unknown
    pub status: ConditionStatus,

    /// Severity, only meaningful when status is False
    #[serde(default, skip_serializing_if = "is_no_severity")]
    pub severity: ConditionSeverity,

    /// Machine-readable reason in CamelCase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the status flipped
    pub last_transition_time: DateTime<Utc>,
}

fn is_no_severity(severity: &ConditionSeverity) -> bool {
    *severity == ConditionSeverity::None
}

impl Condition {
    /// A true condition
    pub fn true_condition(type_: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: ConditionStatus::True,
            severity: ConditionSeverity::None,
            reason: None,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    /// A false condition with reason, severity and message
    pub fn false_condition(
        type_: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            type_: type_.to_string(),
            status: ConditionStatus::False,
            severity,
            reason: Some(reason.to_string()),
            message: (!message.is_empty()).then_some(message),
            last_transition_time: Utc::now(),
        }
    }
}

/// Insert or replace a condition by type.
///
/// `lastTransitionTime` is carried over from the existing condition unless the
/// status changed, so repeated reconciles do not produce status churn.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        if existing.status == condition.status {
            condition.last_transition_time = existing.last_transition_time;
        }
        *existing = condition;
    } else {
        conditions.push(condition);
    }
    conditions.sort_by(|a, b| {
        // Ready first, the rest alphabetically, as clusterctl prints them
        (a.type_ != READY_CONDITION, &a.type_).cmp(&(b.type_ != READY_CONDITION, &b.type_))
    });
}

/// Mark `type_` True
pub fn mark_true(conditions: &mut Vec<Condition>, type_: &str) {
    set_condition(conditions, Condition::true_condition(type_));
}

/// Mark `type_` False with a reason
pub fn mark_false(
    conditions: &mut Vec<Condition>,
    type_: &str,
    reason: &str,
    severity: ConditionSeverity,
    message: impl Into<String>,
) {
    set_condition(conditions, Condition::false_condition(type_, reason, severity, message));
}

/// Look up a condition by type
pub fn get_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Whether `type_` is present and True
pub fn is_true(conditions: &[Condition], type_: &str) -> bool {
    get_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}
