//! Declared resources and intrinsic references.

use serde_json::{Value, json};

/// Resource types the stack declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Vpc,
    InternetGateway,
    VpcGatewayAttachment,
    Subnet,
    ElasticIp,
    NatGateway,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    SecurityGroup,
    Role,
    Cluster,
    LogGroup,
    TaskDefinition,
    Service,
    LoadBalancer,
    Listener,
    TargetGroup,
    Certificate,
    RecordSet,
    ScalableTarget,
    ScalingPolicy,
}

impl ResourceType {
    pub fn cfn_type(&self) -> &'static str {
        match self {
            ResourceType::Vpc => "AWS::EC2::VPC",
            ResourceType::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceType::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceType::Subnet => "AWS::EC2::Subnet",
            ResourceType::ElasticIp => "AWS::EC2::EIP",
            ResourceType::NatGateway => "AWS::EC2::NatGateway",
            ResourceType::RouteTable => "AWS::EC2::RouteTable",
            ResourceType::Route => "AWS::EC2::Route",
            ResourceType::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceType::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceType::Role => "AWS::IAM::Role",
            ResourceType::Cluster => "AWS::ECS::Cluster",
            ResourceType::LogGroup => "AWS::Logs::LogGroup",
            ResourceType::TaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceType::Service => "AWS::ECS::Service",
            ResourceType::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            ResourceType::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            ResourceType::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            ResourceType::Certificate => "AWS::CertificateManager::Certificate",
            ResourceType::RecordSet => "AWS::Route53::RecordSet",
            ResourceType::ScalableTarget => "AWS::ApplicationAutoScaling::ScalableTarget",
            ResourceType::ScalingPolicy => "AWS::ApplicationAutoScaling::ScalingPolicy",
        }
    }
}

/// A single resource declaration handed to a provisioner.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub logical_id: String,
    pub kind: ResourceType,
    pub properties: Value,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, kind: ResourceType, properties: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties,
            depends_on: Vec::new(),
        }
    }

    /// Builder method: add an explicit ordering dependency.
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn reference(&self) -> Value {
        reference(&self.logical_id)
    }

    pub fn attr(&self, attribute: &str) -> Value {
        attr(&self.logical_id, attribute)
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "Type": self.kind.cfn_type(),
            "Properties": self.properties,
        });
        if !self.depends_on.is_empty() {
            body["DependsOn"] = json!(self.depends_on);
        }
        body
    }
}

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn attr(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": ["", parts]}`
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_is_omitted_when_empty() {
        let resource = Resource::new("Cluster", ResourceType::Cluster, json!({}));
        let body = resource.to_json();
        assert_eq!(body["Type"], "AWS::ECS::Cluster");
        assert!(body.get("DependsOn").is_none());
    }

    #[test]
    fn depends_on_is_rendered() {
        let resource = Resource::new("Service", ResourceType::Service, json!({}))
            .depends_on("Listener");
        assert_eq!(resource.to_json()["DependsOn"], json!(["Listener"]));
    }

    #[test]
    fn intrinsics_have_expected_shape() {
        assert_eq!(reference("Vpc"), json!({"Ref": "Vpc"}));
        assert_eq!(attr("Lb", "DNSName"), json!({"Fn::GetAtt": ["Lb", "DNSName"]}));
        assert_eq!(
            join(vec![json!("http://"), attr("Lb", "DNSName")]),
            json!({"Fn::Join": ["", ["http://", {"Fn::GetAtt": ["Lb", "DNSName"]}]]})
        );
    }
}
