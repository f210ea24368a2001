//! KubeEdge `rules.kubeedge.io/v1` custom resources.
//!
//! A `Rule` routes messages from a source `RuleEndpoint` to a target one.
//! Both endpoints are referenced by name; the resource maps carry the
//! endpoint-specific address, of which only the `path` key is edited here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RESOURCE_PATH_KEY: &str = "path";
pub const DESCRIPTION_LABEL: &str = "description";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(group = "rules.kubeedge.io", version = "v1", kind = "Rule", namespaced)]
#[kube(status = "RuleStatus", derive = "PartialEq")]
pub struct RuleSpec {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_resource: BTreeMap<String, String>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub target_resource: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleStatus {
    #[serde(default)]
    pub success_messages: i64,
    #[serde(default)]
    pub fail_messages: i64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl RuleSpec {
    pub fn routed(
        source: impl Into<String>,
        source_path: impl Into<String>,
        target: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_resource: path_resource(source_path.into()),
            target: target.into(),
            target_resource: path_resource(target_path.into()),
        }
    }

    pub fn source_path(&self) -> &str {
        self.source_resource
            .get(RESOURCE_PATH_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn target_path(&self) -> &str {
        self.target_resource
            .get(RESOURCE_PATH_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Endpoint a rule reads from or writes to (`rest`, `eventbus`, `servicebus`).
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "rules.kubeedge.io",
    version = "v1",
    kind = "RuleEndpoint",
    namespaced
)]
pub struct RuleEndpointSpec {
    #[serde(default)]
    pub rule_endpoint_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn path_resource(path: String) -> BTreeMap<String, String> {
    BTreeMap::from([(RESOURCE_PATH_KEY.to_string(), path)])
}
