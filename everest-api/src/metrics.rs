use std::sync::Once;

use metrics::{Unit, describe_counter};

static REGISTER_METRICS: Once = Once::new();

pub const EVEREST_MONITORING_INSTANCE_OPERATIONS_TOTAL: &str =
    "everest_monitoring_instance_operations_total";
pub const EVEREST_PMM_API_KEYS_CREATED_TOTAL: &str = "everest_pmm_api_keys_created_total";
pub const EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL: &str =
    "everest_monitoring_secret_rollbacks_total";
pub const OPERATION: &str = "operation";
pub const OUTCOME: &str = "outcome";
pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";

/// Registers the metrics emitted by the API. Safe to call more than once, the
/// descriptions are only registered the first time.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            EVEREST_MONITORING_INSTANCE_OPERATIONS_TOTAL,
            Unit::Count,
            "Total number of monitoring instance operations by operation and outcome"
        );

        describe_counter!(
            EVEREST_PMM_API_KEYS_CREATED_TOTAL,
            Unit::Count,
            "Total number of API keys minted on PMM servers"
        );

        describe_counter!(
            EVEREST_MONITORING_SECRET_ROLLBACKS_TOTAL,
            Unit::Count,
            "Total number of credentials secrets deleted after a failed monitoring config write"
        );
    });
}
