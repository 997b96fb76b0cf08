//! Server-side tag manager stack assembly.
//!
//! Turns resolved [`StackSettings`] into resource declarations. The tier
//! check runs again before the first declaration so that a hand-built
//! `StackSettings` can never reach the provisioner with an illegal
//! cpu/memory pair.

use serde_json::{Value, json};
use tracing::info;

use sgtm_core::{CertificateSource, StackSettings, tiers};

use crate::asset::ImageAsset;
use crate::error::StackResult;
use crate::provisioner::Provisioner;
use crate::resource::{Resource, ResourceType, attr, join, reference};
use crate::scaling;

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const MAX_AZS: u32 = 2;
pub const CONTAINER_PORT: u16 = 8080;
pub const PREVIEW_PORT: u16 = 444;
pub const HEALTH_CHECK_PATH: &str = "/healthz";

const VPC: &str = "Vpc";
const INTERNET_GATEWAY: &str = "VpcIGW";
const GATEWAY_ATTACHMENT: &str = "VpcVPCGW";
const CLUSTER: &str = "FargateCluster";
const LOG_GROUP: &str = "FargateTaskDefinitionLogGroup";
const EXECUTION_ROLE: &str = "FargateTaskDefinitionExecutionRole";
const LB_SECURITY_GROUP: &str = "AlbServiceLBSecurityGroup";
const SERVICE_SECURITY_GROUP: &str = "AlbServiceSecurityGroup";
const TASK_DEFINITION: &str = "FargateTaskDefinition";
const LOAD_BALANCER: &str = "AlbServiceLB";
const TARGET_GROUP: &str = "AlbServiceTargetGroup";
const PUBLIC_LISTENER: &str = "AlbServicePublicListener";
const REDIRECT_LISTENER: &str = "AlbServicePublicRedirectListener";
const SERVICE: &str = "AlbService";
const RECORD: &str = "AlbServiceDNS";
const CERTIFICATE: &str = "Certificate";
const PREVIEW_TASK_DEFINITION: &str = "FargateTaskDefinitionPreview";
const PREVIEW_SERVICE: &str = "PreviewService";
const PREVIEW_LISTENER: &str = "PreviewListener";
const PREVIEW_TARGET_GROUP: &str = "PreviewTarget";

/// What was declared, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub https: bool,
    pub preview: bool,
    pub nat_gateways: u32,
}

/// Subnet ids produced by the network section.
struct Network {
    public: Vec<String>,
    private: Vec<String>,
    nat_gateways: u32,
}

const EXECUTION_ROLE_POLICY: &str = "policy/service-role/AmazonECSTaskExecutionRolePolicy";

impl Network {
    /// Tasks run in private subnets when they have NAT egress.
    fn task_subnets(&self) -> (&[String], &'static str) {
        if self.nat_gateways > 0 {
            (self.private.as_slice(), "DISABLED")
        } else {
            (self.public.as_slice(), "ENABLED")
        }
    }
}

pub struct GtmStack<'a> {
    name: &'a str,
    settings: &'a StackSettings,
    asset: &'a ImageAsset,
}

impl<'a> GtmStack<'a> {
    pub fn new(name: &'a str, settings: &'a StackSettings, asset: &'a ImageAsset) -> Self {
        Self {
            name,
            settings,
            asset,
        }
    }

    /// Declare the whole stack into `provisioner`.
    pub fn declare<P: Provisioner + ?Sized>(&self, provisioner: &mut P) -> StackResult<StackSummary> {
        tiers::validate(self.settings.cpu, self.settings.memory)?;

        let certificate = self.certificate(provisioner)?;
        let preview = certificate.is_some() && self.settings.preview_enabled();
        let network = self.network(provisioner)?;

        provisioner.declare(Resource::new(CLUSTER, ResourceType::Cluster, json!({})))?;
        provisioner.declare(Resource::new(
            LOG_GROUP,
            ResourceType::LogGroup,
            json!({ "RetentionInDays": 731 }),
        ))?;
        provisioner.declare(execution_role())?;

        let mut environment = vec![("CONTAINER_CONFIG", self.settings.container_config.clone())];
        if let Some(url) = self.settings.preview_server_url() {
            environment.push(("PREVIEW_SERVER_URL", url));
        }
        provisioner.declare(self.task_definition(TASK_DEFINITION, "Container", &environment))?;

        self.security_groups(provisioner, certificate.is_some(), preview)?;
        self.load_balanced_service(provisioner, &network, certificate.as_ref())?;
        scaling::declare_cpu_scaling(provisioner, SERVICE, CLUSTER, SERVICE, &self.settings.scaling)?;

        if let (Some(certificate), true) = (&certificate, preview) {
            self.preview_server(provisioner, &network, certificate)?;
        }

        self.outputs(provisioner, certificate.is_some())?;

        let summary = StackSummary {
            https: certificate.is_some(),
            preview,
            nat_gateways: network.nat_gateways,
        };
        info!(
            stack = self.name,
            cpu = self.settings.cpu,
            memory = self.settings.memory,
            https = summary.https,
            preview = summary.preview,
            "stack declared"
        );
        Ok(summary)
    }

    /// Returns the value to place in listener `Certificates`, if any.
    fn certificate<P: Provisioner + ?Sized>(&self, provisioner: &mut P) -> StackResult<Option<Value>> {
        match self.settings.certificate() {
            CertificateSource::Imported { arn } => Ok(Some(json!(arn))),
            CertificateSource::DnsValidated { domain, zone } => {
                let certificate = Resource::new(
                    CERTIFICATE,
                    ResourceType::Certificate,
                    json!({
                        "DomainName": domain,
                        "ValidationMethod": "DNS",
                        "DomainValidationOptions": [
                            { "DomainName": domain, "HostedZoneId": zone.id },
                        ],
                    }),
                );
                let value = certificate.reference();
                provisioner.declare(certificate)?;
                Ok(Some(value))
            }
            CertificateSource::None => Ok(None),
        }
    }

    fn network<P: Provisioner + ?Sized>(&self, provisioner: &mut P) -> StackResult<Network> {
        provisioner.declare(Resource::new(
            VPC,
            ResourceType::Vpc,
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": format!("{}/vpc", self.name) }],
            }),
        ))?;
        provisioner.declare(Resource::new(
            INTERNET_GATEWAY,
            ResourceType::InternetGateway,
            json!({}),
        ))?;
        provisioner.declare(Resource::new(
            GATEWAY_ATTACHMENT,
            ResourceType::VpcGatewayAttachment,
            json!({
                "VpcId": reference(VPC),
                "InternetGatewayId": reference(INTERNET_GATEWAY),
            }),
        ))?;

        let nat_gateways = self.settings.nat_gateways.min(MAX_AZS);
        let mut network = Network {
            public: Vec::new(),
            private: Vec::new(),
            nat_gateways,
        };
        let mut nats = Vec::new();

        for az in 0..MAX_AZS {
            let prefix = format!("VpcPublicSubnet{}", az + 1);
            let public_id = format!("{prefix}Subnet");
            provisioner.declare(subnet(&public_id, az, subnet_cidr(az), true))?;
            let table = route_table(provisioner, &prefix, &public_id)?;
            provisioner.declare(
                default_route(&prefix, &table, "GatewayId", INTERNET_GATEWAY)
                    .depends_on(GATEWAY_ATTACHMENT),
            )?;
            network.public.push(public_id.clone());

            if az < nat_gateways {
                let eip_id = format!("{prefix}EIP");
                let nat_id = format!("{prefix}NATGateway");
                provisioner.declare(
                    Resource::new(eip_id.clone(), ResourceType::ElasticIp, json!({ "Domain": "vpc" }))
                        .depends_on(GATEWAY_ATTACHMENT),
                )?;
                provisioner.declare(Resource::new(
                    nat_id.clone(),
                    ResourceType::NatGateway,
                    json!({
                        "AllocationId": attr(&eip_id, "AllocationId"),
                        "SubnetId": reference(&public_id),
                    }),
                ))?;
                nats.push(nat_id);
            }
        }

        // Private subnets without a NAT in their own AZ share the last one.
        for az in 0..MAX_AZS {
            let prefix = format!("VpcPrivateSubnet{}", az + 1);
            let private_id = format!("{prefix}Subnet");
            provisioner.declare(subnet(&private_id, az, subnet_cidr(MAX_AZS + az), false))?;
            let table = route_table(provisioner, &prefix, &private_id)?;
            if let Some(nat) = nats.get(az as usize).or(nats.last()) {
                provisioner.declare(default_route(&prefix, &table, "NatGatewayId", nat))?;
            }
            network.private.push(private_id);
        }

        Ok(network)
    }

    /// Load balancer group open on the listener ports, service group open
    /// only to the load balancer on the container port.
    fn security_groups<P: Provisioner + ?Sized>(
        &self,
        provisioner: &mut P,
        https: bool,
        preview: bool,
    ) -> StackResult<()> {
        let mut ports = vec![80];
        if https {
            ports.push(443);
        }
        if preview {
            ports.push(PREVIEW_PORT);
        }
        let ingress: Vec<Value> = ports
            .iter()
            .map(|port| {
                json!({
                    "IpProtocol": "tcp",
                    "CidrIp": "0.0.0.0/0",
                    "FromPort": port,
                    "ToPort": port,
                    "Description": format!("Allow from anyone on port {port}"),
                })
            })
            .collect();

        provisioner.declare(Resource::new(
            LB_SECURITY_GROUP,
            ResourceType::SecurityGroup,
            json!({
                "GroupDescription": format!("{}/AlbService/LB/SecurityGroup", self.name),
                "VpcId": reference(VPC),
                "SecurityGroupIngress": ingress,
            }),
        ))?;
        provisioner.declare(Resource::new(
            SERVICE_SECURITY_GROUP,
            ResourceType::SecurityGroup,
            json!({
                "GroupDescription": format!("{}/AlbService/Service/SecurityGroup", self.name),
                "VpcId": reference(VPC),
                "SecurityGroupIngress": [{
                    "IpProtocol": "tcp",
                    "FromPort": CONTAINER_PORT,
                    "ToPort": CONTAINER_PORT,
                    "SourceSecurityGroupId": attr(LB_SECURITY_GROUP, "GroupId"),
                    "Description": "Load balancer to target",
                }],
            }),
        ))
    }

    fn task_definition(&self, logical_id: &str, container: &str, environment: &[(&str, String)]) -> Resource {
        let environment: Vec<Value> = environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();

        Resource::new(
            logical_id,
            ResourceType::TaskDefinition,
            json!({
                "Family": format!("{}{logical_id}", self.name),
                "Cpu": self.settings.cpu.to_string(),
                "Memory": self.settings.memory.to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "ExecutionRoleArn": attr(EXECUTION_ROLE, "Arn"),
                "RuntimePlatform": {
                    "CpuArchitecture": "X86_64",
                    "OperatingSystemFamily": "LINUX",
                },
                "ContainerDefinitions": [{
                    "Name": container,
                    "Image": self.asset.image_uri(),
                    "Essential": true,
                    "ReadonlyRootFilesystem": true,
                    "PortMappings": [{ "ContainerPort": CONTAINER_PORT, "Protocol": "tcp" }],
                    "Environment": environment,
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": reference(LOG_GROUP),
                            "awslogs-stream-prefix": self.name,
                            "awslogs-region": reference("AWS::Region"),
                        },
                    },
                }],
            }),
        )
        .depends_on(LOG_GROUP)
        .depends_on(EXECUTION_ROLE)
    }

    fn load_balanced_service<P: Provisioner + ?Sized>(
        &self,
        provisioner: &mut P,
        network: &Network,
        certificate: Option<&Value>,
    ) -> StackResult<()> {
        let public_subnets = references(&network.public);
        provisioner.declare(
            Resource::new(
                LOAD_BALANCER,
                ResourceType::LoadBalancer,
                json!({
                    "Scheme": "internet-facing",
                    "Type": "application",
                    "Subnets": public_subnets,
                    "SecurityGroups": [attr(LB_SECURITY_GROUP, "GroupId")],
                }),
            )
            .depends_on(GATEWAY_ATTACHMENT),
        )?;
        provisioner.declare(target_group(TARGET_GROUP))?;

        let mut listener = json!({
            "LoadBalancerArn": reference(LOAD_BALANCER),
            "DefaultActions": [{ "Type": "forward", "TargetGroupArn": reference(TARGET_GROUP) }],
        });
        match certificate {
            Some(certificate) => {
                listener["Port"] = json!(443);
                listener["Protocol"] = json!("HTTPS");
                listener["Certificates"] = json!([{ "CertificateArn": certificate }]);
            }
            None => {
                listener["Port"] = json!(80);
                listener["Protocol"] = json!("HTTP");
            }
        }
        provisioner.declare(Resource::new(PUBLIC_LISTENER, ResourceType::Listener, listener))?;

        if certificate.is_some() {
            provisioner.declare(Resource::new(
                REDIRECT_LISTENER,
                ResourceType::Listener,
                json!({
                    "LoadBalancerArn": reference(LOAD_BALANCER),
                    "Port": 80,
                    "Protocol": "HTTP",
                    "DefaultActions": [{
                        "Type": "redirect",
                        "RedirectConfig": {
                            "Protocol": "HTTPS",
                            "Port": "443",
                            "StatusCode": "HTTP_301",
                        },
                    }],
                }),
            ))?;
        }

        provisioner.declare(
            self.service(
                SERVICE,
                TASK_DEFINITION,
                "Container",
                TARGET_GROUP,
                self.settings.desired_count,
                network,
            )
            .depends_on(PUBLIC_LISTENER),
        )?;

        if let (Some(zone), Some(domain)) = (&self.settings.hosted_zone, &self.settings.domain) {
            provisioner.declare(Resource::new(
                RECORD,
                ResourceType::RecordSet,
                json!({
                    "HostedZoneId": zone.id,
                    "Name": format!("{domain}."),
                    "Type": "A",
                    "AliasTarget": {
                        "DNSName": attr(LOAD_BALANCER, "DNSName"),
                        "HostedZoneId": attr(LOAD_BALANCER, "CanonicalHostedZoneID"),
                    },
                }),
            ))?;
        }

        Ok(())
    }

    fn service(
        &self,
        logical_id: &str,
        task_definition: &str,
        container: &str,
        target_group: &str,
        desired_count: u32,
        network: &Network,
    ) -> Resource {
        let (subnets, assign_public_ip) = network.task_subnets();
        let subnets = references(subnets);

        Resource::new(
            logical_id,
            ResourceType::Service,
            json!({
                "Cluster": reference(CLUSTER),
                "LaunchType": "FARGATE",
                "DesiredCount": desired_count,
                "TaskDefinition": reference(task_definition),
                "HealthCheckGracePeriodSeconds": 60,
                "LoadBalancers": [{
                    "ContainerName": container,
                    "ContainerPort": CONTAINER_PORT,
                    "TargetGroupArn": reference(target_group),
                }],
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": assign_public_ip,
                        "Subnets": subnets,
                        "SecurityGroups": [attr(SERVICE_SECURITY_GROUP, "GroupId")],
                    },
                },
            }),
        )
    }

    /// Second service on the same load balancer, reachable on port 444.
    fn preview_server<P: Provisioner + ?Sized>(
        &self,
        provisioner: &mut P,
        network: &Network,
        certificate: &Value,
    ) -> StackResult<()> {
        let environment = [
            ("CONTAINER_CONFIG", self.settings.container_config.clone()),
            ("RUN_AS_PREVIEW_SERVER", "true".to_string()),
        ];
        provisioner.declare(self.task_definition(
            PREVIEW_TASK_DEFINITION,
            "preview-container",
            &environment,
        ))?;

        provisioner.declare(target_group(PREVIEW_TARGET_GROUP))?;
        provisioner.declare(Resource::new(
            PREVIEW_LISTENER,
            ResourceType::Listener,
            json!({
                "LoadBalancerArn": reference(LOAD_BALANCER),
                "Port": PREVIEW_PORT,
                "Protocol": "HTTPS",
                "Certificates": [{ "CertificateArn": certificate }],
                "DefaultActions": [{
                    "Type": "forward",
                    "TargetGroupArn": reference(PREVIEW_TARGET_GROUP),
                }],
            }),
        ))?;

        provisioner.declare(
            self.service(
                PREVIEW_SERVICE,
                PREVIEW_TASK_DEFINITION,
                "preview-container",
                PREVIEW_TARGET_GROUP,
                1,
                network,
            )
            .depends_on(PREVIEW_LISTENER),
        )
    }

    fn outputs<P: Provisioner + ?Sized>(&self, provisioner: &mut P, https: bool) -> StackResult<()> {
        provisioner.output(
            "LoadBalancerDNS",
            attr(LOAD_BALANCER, "DNSName"),
            "Load balancer DNS name",
        )?;

        let scheme = if https { "https://" } else { "http://" };
        let url = match (&self.settings.hosted_zone, &self.settings.domain) {
            (Some(_), Some(domain)) => json!(format!("{scheme}{domain}")),
            _ => join(vec![json!(scheme), attr(LOAD_BALANCER, "DNSName")]),
        };
        provisioner.output("ServiceURL", url, "Tag manager endpoint")
    }
}

fn references(ids: &[String]) -> Vec<Value> {
    ids.iter().map(String::as_str).map(reference).collect()
}

fn execution_role() -> Resource {
    Resource::new(
        EXECUTION_ROLE,
        ResourceType::Role,
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": [join(vec![
                json!("arn:"),
                reference("AWS::Partition"),
                json!(format!(":iam::aws:{EXECUTION_ROLE_POLICY}")),
            ])],
        }),
    )
}

/// Declares `{prefix}RouteTable` and associates it with `subnet_id`.
fn route_table<P: Provisioner + ?Sized>(
    provisioner: &mut P,
    prefix: &str,
    subnet_id: &str,
) -> StackResult<String> {
    let table = format!("{prefix}RouteTable");
    provisioner.declare(Resource::new(
        table.clone(),
        ResourceType::RouteTable,
        json!({ "VpcId": reference(VPC) }),
    ))?;
    provisioner.declare(Resource::new(
        format!("{prefix}RouteTableAssociation"),
        ResourceType::SubnetRouteTableAssociation,
        json!({
            "RouteTableId": reference(&table),
            "SubnetId": reference(subnet_id),
        }),
    ))?;
    Ok(table)
}

/// `0.0.0.0/0` through `target`, where `via` is `GatewayId` or `NatGatewayId`.
fn default_route(prefix: &str, table: &str, via: &str, target: &str) -> Resource {
    let mut properties = json!({
        "RouteTableId": reference(table),
        "DestinationCidrBlock": "0.0.0.0/0",
    });
    properties[via] = reference(target);
    Resource::new(format!("{prefix}DefaultRoute"), ResourceType::Route, properties)
}

/// `/18` blocks carved out of [`VPC_CIDR`], public subnets first.
fn subnet_cidr(index: u32) -> String {
    format!("10.0.{}.0/18", index * 64)
}

fn subnet(logical_id: &str, az: u32, cidr: String, public: bool) -> Resource {
    Resource::new(
        logical_id,
        ResourceType::Subnet,
        json!({
            "VpcId": reference(VPC),
            "CidrBlock": cidr,
            "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] },
            "MapPublicIpOnLaunch": public,
        }),
    )
}

fn target_group(logical_id: &str) -> Resource {
    Resource::new(
        logical_id,
        ResourceType::TargetGroup,
        json!({
            "Port": CONTAINER_PORT,
            "Protocol": "HTTP",
            "TargetType": "ip",
            "VpcId": reference(VPC),
            "HealthCheckPath": HEALTH_CHECK_PATH,
        }),
    )
}
