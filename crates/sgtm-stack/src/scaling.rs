//! Service autoscaling declarations.
//!
//! The service task count is registered as a scalable target bounded by
//! `taskMinCapacity..=taskMaxCapacity`, with a single target-tracking
//! policy on average CPU utilization:
//!
//! ```text
//! ScalableTarget  ecs:service:DesiredCount  min..=max
//!   └── ScalingPolicy  TargetTrackingScaling
//!         ECSServiceAverageCPUUtilization = target %
//! ```

use serde_json::json;

use sgtm_core::ScalingSettings;

use crate::error::StackResult;
use crate::provisioner::Provisioner;
use crate::resource::{Resource, ResourceType, attr, join, reference};

pub const POLICY_NAME: &str = "cpu-utilization";

/// Declare scaling for the ECS service `service_id` in `cluster_id`.
///
/// `prefix` namespaces the logical ids.
pub fn declare_cpu_scaling<P: Provisioner + ?Sized>(
    provisioner: &mut P,
    prefix: &str,
    cluster_id: &str,
    service_id: &str,
    scaling: &ScalingSettings,
) -> StackResult<()> {
    let target_id = format!("{prefix}TaskCountTarget");
    let target = Resource::new(
        target_id.clone(),
        ResourceType::ScalableTarget,
        json!({
            "MinCapacity": scaling.min_capacity,
            "MaxCapacity": scaling.max_capacity,
            "ResourceId": join(vec![
                json!("service/"),
                reference(cluster_id),
                json!("/"),
                attr(service_id, "Name"),
            ]),
            "ScalableDimension": "ecs:service:DesiredCount",
            "ServiceNamespace": "ecs",
        }),
    )
    .depends_on(service_id);
    provisioner.declare(target)?;

    let policy = Resource::new(
        format!("{prefix}TaskCountTargetCpuScaling"),
        ResourceType::ScalingPolicy,
        json!({
            "PolicyName": POLICY_NAME,
            "PolicyType": "TargetTrackingScaling",
            "ScalingTargetId": reference(&target_id),
            "TargetTrackingScalingPolicyConfiguration": {
                "PredefinedMetricSpecification": {
                    "PredefinedMetricType": "ECSServiceAverageCPUUtilization",
                },
                "TargetValue": scaling.target_cpu_utilization,
            },
        }),
    );
    provisioner.declare(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::Template;

    #[test]
    fn declares_target_and_policy() {
        let mut template = Template::default();
        template
            .declare(Resource::new("Cluster", ResourceType::Cluster, json!({})))
            .unwrap();
        template
            .declare(Resource::new("Service", ResourceType::Service, json!({})))
            .unwrap();

        let scaling = ScalingSettings {
            min_capacity: 1,
            max_capacity: 4,
            target_cpu_utilization: 70,
        };
        declare_cpu_scaling(&mut template, "AlbService", "Cluster", "Service", &scaling).unwrap();

        let target = template.resource("AlbServiceTaskCountTarget").unwrap();
        assert_eq!(target.properties["MinCapacity"], 1);
        assert_eq!(target.properties["MaxCapacity"], 4);
        assert_eq!(target.depends_on, vec!["Service".to_string()]);

        let policy = template.resource("AlbServiceTaskCountTargetCpuScaling").unwrap();
        let config = &policy.properties["TargetTrackingScalingPolicyConfiguration"];
        assert_eq!(config["TargetValue"], 70);
        assert_eq!(
            config["PredefinedMetricSpecification"]["PredefinedMetricType"],
            "ECSServiceAverageCPUUtilization"
        );
    }

    #[test]
    fn requires_declared_service() {
        let mut template = Template::default();
        let scaling = ScalingSettings {
            min_capacity: 1,
            max_capacity: 2,
            target_cpu_utilization: 80,
        };
        assert!(declare_cpu_scaling(&mut template, "Svc", "Cluster", "Service", &scaling).is_err());
    }
}
