//! Provisioner interface and the in-tree template synthesizer.
//!
//! A [`Provisioner`] receives desired-state declarations. Diffing and
//! applying them belong to whatever consumes the result; the [`Template`]
//! implementation only records declarations and renders them as a
//! CloudFormation-shaped JSON document.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::debug;

use sgtm_core::Environment;

use crate::error::{StackError, StackResult};
use crate::resource::{Resource, ResourceType};

/// Receives resource declarations in dependency order.
pub trait Provisioner {
    /// Declare a resource. Every `depends_on` entry must already be declared.
    fn declare(&mut self, resource: Resource) -> StackResult<()>;

    /// Declare a named stack output.
    fn output(&mut self, name: &str, value: Value, description: &str) -> StackResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
struct Output {
    value: Value,
    description: String,
}

/// Collects declarations into a synthesized template.
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: String,
    environment: Environment,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>, environment: Environment) -> Self {
        Self {
            description: description.into(),
            environment,
            ..Self::default()
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources_of(&self, kind: ResourceType) -> impl Iterator<Item = &Resource> {
        self.resources.values().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn output_value(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name).map(|o| &o.value)
    }

    pub fn to_json(&self) -> Value {
        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|(id, r)| (id.clone(), r.to_json()))
            .collect();
        let outputs: Map<String, Value> = self
            .outputs
            .iter()
            .map(|(name, o)| {
                (
                    name.clone(),
                    json!({ "Value": o.value, "Description": o.description }),
                )
            })
            .collect();

        let mut template = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": self.description,
            "Resources": resources,
            "Outputs": outputs,
        });

        let mut metadata = Map::new();
        if let Some(account) = &self.environment.account {
            metadata.insert("Account".to_string(), json!(account));
        }
        if let Some(region) = &self.environment.region {
            metadata.insert("Region".to_string(), json!(region));
        }
        if !metadata.is_empty() {
            template["Metadata"] = Value::Object(metadata);
        }
        template
    }

    pub fn to_json_string(&self) -> StackResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }
}

impl Provisioner for Template {
    fn declare(&mut self, resource: Resource) -> StackResult<()> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(StackError::DuplicateResource(resource.logical_id));
        }
        if let Some(missing) = resource
            .depends_on
            .iter()
            .find(|dep| !self.resources.contains_key(dep.as_str()))
        {
            return Err(StackError::UnknownDependency {
                resource: resource.logical_id.clone(),
                dependency: missing.clone(),
            });
        }

        debug!(
            id = %resource.logical_id,
            kind = resource.kind.cfn_type(),
            "declared resource"
        );
        self.resources.insert(resource.logical_id.clone(), resource);
        Ok(())
    }

    fn output(&mut self, name: &str, value: Value, description: &str) -> StackResult<()> {
        if self.outputs.contains_key(name) {
            return Err(StackError::DuplicateOutput(name.to_string()));
        }
        self.outputs.insert(
            name.to_string(),
            Output {
                value,
                description: description.to_string(),
            },
        );
        Ok(())
    }
}
