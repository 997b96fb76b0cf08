//! Typed stack settings resolved from a [`Context`].
//!
//! Resolution applies defaults, parses values and runs every fatal check
//! (including the resource-tier validation) before anything is declared.

use tracing::debug;

use crate::context::Context;
use crate::error::{ConfigError, ConfigResult};
use crate::tiers;

const DEFAULT_CPU: u32 = 256;
const DEFAULT_MEMORY: u32 = 512;
const DEFAULT_DESIRED_COUNT: u32 = 1;
const DEFAULT_MAX_CAPACITY: u32 = 2;
const DEFAULT_MIN_CAPACITY: u32 = 1;
const DEFAULT_TARGET_CPU: u32 = 80;
const DEFAULT_NAT_GATEWAYS: u32 = 2;

/// Target account and region for the stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    /// Read `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION` from `vars`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut env = Self::default();
        for (name, value) in vars {
            match name.as_ref() {
                "CDK_DEFAULT_ACCOUNT" => env.account = Some(value.into()),
                "CDK_DEFAULT_REGION" => env.region = Some(value.into()),
                _ => {}
            }
        }
        env
    }
}

/// An existing Route 53 hosted zone, imported by attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// Where the listener certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// Existing certificate, referenced by ARN.
    Imported { arn: String },
    /// New certificate for `domain`, validated through DNS in `zone`.
    DnsValidated { domain: String, zone: HostedZone },
    /// Plain HTTP.
    None,
}

impl CertificateSource {
    pub fn is_some(&self) -> bool {
        !matches!(self, CertificateSource::None)
    }
}

/// Service autoscaling bounds and target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingSettings {
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Average CPU utilization to track, in percent.
    pub target_cpu_utilization: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSettings {
    /// CPU units per task.
    pub cpu: u32,
    /// Memory per task, MiB.
    pub memory: u32,
    pub desired_count: u32,
    pub scaling: ScalingSettings,
    pub nat_gateways: u32,
    /// Opaque tag-manager container configuration.
    pub container_config: String,
    pub domain: Option<String>,
    pub certificate_arn: Option<String>,
    pub hosted_zone: Option<HostedZone>,
    pub preview_server: bool,
}

impl StackSettings {
    /// Resolve and validate settings. Any error is fatal to the run.
    pub fn resolve(context: &Context) -> ConfigResult<Self> {
        context.warn_unknown();

        let container_config = context
            .get("containerConfig")
            .ok_or(ConfigError::MissingContainerConfig)?
            .to_string();

        let cpu = parse_u32(context, "cpu", DEFAULT_CPU)?;
        let memory = parse_u32(context, "mem", DEFAULT_MEMORY)?;
        tiers::validate(cpu, memory)?;

        let min_capacity = parse_u32(context, "taskMinCapacity", DEFAULT_MIN_CAPACITY)?;
        let max_capacity = parse_u32(context, "taskMaxCapacity", DEFAULT_MAX_CAPACITY)?;
        if min_capacity > max_capacity {
            return Err(ConfigError::InvalidCapacity {
                min: min_capacity,
                max: max_capacity,
            });
        }

        let target_cpu_utilization =
            parse_u32(context, "targetCpuUtilization", DEFAULT_TARGET_CPU)?;
        if !(1..=100).contains(&target_cpu_utilization) {
            return Err(ConfigError::InvalidValue {
                key: "targetCpuUtilization".to_string(),
                value: target_cpu_utilization.to_string(),
                reason: "expected a percentage between 1 and 100".to_string(),
            });
        }

        let hosted_zone = match context.get("hostedZoneId") {
            Some(id) => {
                let name = context
                    .get("hostedZoneName")
                    .ok_or_else(|| ConfigError::MissingHostedZoneName(id.to_string()))?;
                Some(HostedZone {
                    id: id.to_string(),
                    name: name.to_string(),
                })
            }
            None => None,
        };

        let certificate_arn = context.get("certificateArn").map(str::to_string);
        let domain = context.get("domain").map(str::to_string);
        if let (None, Some(zone), None) = (&certificate_arn, &hosted_zone, &domain) {
            return Err(ConfigError::MissingDomain(zone.id.clone()));
        }

        let settings = StackSettings {
            cpu,
            memory,
            desired_count: parse_u32(context, "desiredNodeCount", DEFAULT_DESIRED_COUNT)?,
            scaling: ScalingSettings {
                min_capacity,
                max_capacity,
                target_cpu_utilization,
            },
            nat_gateways: parse_u32(context, "natGateways", DEFAULT_NAT_GATEWAYS)?,
            container_config,
            domain,
            certificate_arn,
            hosted_zone,
            preview_server: parse_bool(context, "previewServer", true)?,
        };

        debug!(
            cpu = settings.cpu,
            memory = settings.memory,
            desired = settings.desired_count,
            https = settings.certificate().is_some(),
            "resolved stack settings"
        );
        Ok(settings)
    }

    pub fn certificate(&self) -> CertificateSource {
        match (&self.certificate_arn, &self.hosted_zone, &self.domain) {
            (Some(arn), _, _) => CertificateSource::Imported { arn: arn.clone() },
            (None, Some(zone), Some(domain)) => CertificateSource::DnsValidated {
                domain: domain.clone(),
                zone: zone.clone(),
            },
            _ => CertificateSource::None,
        }
    }

    /// The preview server needs HTTPS on a custom domain.
    pub fn preview_enabled(&self) -> bool {
        self.preview_server && self.domain.is_some() && self.certificate().is_some()
    }

    /// URL the main container uses to reach the preview server.
    pub fn preview_server_url(&self) -> Option<String> {
        match &self.domain {
            Some(domain) if self.preview_enabled() => Some(format!("https://{domain}:444")),
            _ => None,
        }
    }
}

fn parse_u32(context: &Context, key: &str, default: u32) -> ConfigResult<u32> {
    match context.get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }
        }),
        None => Ok(default),
    }
}

fn parse_bool(context: &Context, key: &str, default: bool) -> ConfigResult<bool> {
    match context.get(key).map(str::trim) {
        Some(raw) if raw.eq_ignore_ascii_case("true") => Ok(true),
        Some(raw) if raw.eq_ignore_ascii_case("false") => Ok(false),
        Some(raw) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::TierError;

    fn context(pairs: &[(&str, &str)]) -> Context {
        let mut context = Context::new();
        context.set("containerConfig", "aWQ9R1RN");
        for (key, value) in pairs {
            context.set(*key, *value);
        }
        context
    }

    #[test]
    fn defaults_apply_when_keys_absent() {
        let settings = StackSettings::resolve(&context(&[])).unwrap();
        assert_eq!(settings.cpu, 256);
        assert_eq!(settings.memory, 512);
        assert_eq!(settings.desired_count, 1);
        assert_eq!(settings.scaling.min_capacity, 1);
        assert_eq!(settings.scaling.max_capacity, 2);
        assert_eq!(settings.scaling.target_cpu_utilization, 80);
        assert_eq!(settings.nat_gateways, 2);
        assert!(settings.preview_server);
        assert_eq!(settings.certificate(), CertificateSource::None);
        assert!(!settings.preview_enabled());
    }

    #[test]
    fn container_config_is_required() {
        let err = StackSettings::resolve(&Context::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingContainerConfig));
    }

    #[test]
    fn invalid_tier_halts_resolution() {
        let err = StackSettings::resolve(&context(&[("cpu", "100")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Tier(TierError::InvalidCpuTier { cpu: 100, .. })
        ));

        let err = StackSettings::resolve(&context(&[("cpu", "512"), ("mem", "5000")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Tier(TierError::InvalidMemoryForCpu { cpu: 512, memory: 5000, .. })
        ));
    }

    #[test]
    fn zero_cpu_is_not_coerced_to_default() {
        let err = StackSettings::resolve(&context(&[("cpu", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Tier(TierError::InvalidCpuTier { cpu: 0, .. })));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let err = StackSettings::resolve(&context(&[("desiredNodeCount", "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "desiredNodeCount"));

        let err = StackSettings::resolve(&context(&[("mem", "-512")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "mem"));
    }

    #[test]
    fn capacity_bounds_must_be_ordered() {
        let err = StackSettings::resolve(&context(&[
            ("taskMinCapacity", "5"),
            ("taskMaxCapacity", "2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity { min: 5, max: 2 }));
    }

    #[test]
    fn target_utilization_must_be_a_percentage() {
        for bad in ["0", "101"] {
            let err = StackSettings::resolve(&context(&[("targetCpuUtilization", bad)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }));
        }
    }

    #[test]
    fn hosted_zone_needs_a_name() {
        let err = StackSettings::resolve(&context(&[("hostedZoneId", "Z123")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingHostedZoneName(ref id) if id == "Z123"));
    }

    #[test]
    fn issued_certificate_needs_a_domain() {
        let err = StackSettings::resolve(&context(&[
            ("hostedZoneId", "Z123"),
            ("hostedZoneName", "example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingDomain(_)));
    }

    #[test]
    fn certificate_arn_takes_precedence() {
        let settings = StackSettings::resolve(&context(&[
            ("certificateArn", "arn:aws:acm:eu-west-1:123:certificate/abc"),
            ("hostedZoneId", "Z123"),
            ("hostedZoneName", "example.com"),
            ("domain", "gtm.example.com"),
        ]))
        .unwrap();
        assert!(matches!(settings.certificate(), CertificateSource::Imported { .. }));
        assert_eq!(
            settings.preview_server_url().as_deref(),
            Some("https://gtm.example.com:444")
        );
    }

    #[test]
    fn hosted_zone_and_domain_issue_a_certificate() {
        let settings = StackSettings::resolve(&context(&[
            ("hostedZoneId", "Z123"),
            ("hostedZoneName", "example.com"),
            ("domain", "gtm.example.com"),
        ]))
        .unwrap();
        match settings.certificate() {
            CertificateSource::DnsValidated { domain, zone } => {
                assert_eq!(domain, "gtm.example.com");
                assert_eq!(zone.name, "example.com");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(settings.preview_enabled());
    }

    #[test]
    fn preview_server_can_be_disabled() {
        let settings = StackSettings::resolve(&context(&[
            ("certificateArn", "arn:aws:acm:eu-west-1:123:certificate/abc"),
            ("domain", "gtm.example.com"),
            ("previewServer", "false"),
        ]))
        .unwrap();
        assert!(!settings.preview_enabled());
        assert!(settings.preview_server_url().is_none());
    }

    #[test]
    fn domain_without_certificate_has_no_preview() {
        let settings = StackSettings::resolve(&context(&[("domain", "gtm.example.com")])).unwrap();
        assert_eq!(settings.certificate(), CertificateSource::None);
        assert!(!settings.preview_enabled());
    }

    #[test]
    fn environment_reads_cdk_defaults() {
        let env = Environment::from_vars([
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("CDK_DEFAULT_REGION", "eu-central-1"),
            ("PATH", "/usr/bin"),
        ]);
        assert_eq!(env.account.as_deref(), Some("123456789012"));
        assert_eq!(env.region.as_deref(), Some("eu-central-1"));
    }
}
