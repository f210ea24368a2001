use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::crd::{Rule, RuleEndpoint};
use crate::model::{MutationOutcome, NamespaceScope};

const MISSING_CREATION_TIMESTAMP: &str = "server response carried no creation timestamp";
const UNCONFIRMED_DELETE: &str = "deletion was not confirmed by the server";

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    user: String,
    default_namespace: String,
    request_timeout: Duration,
}

/// What the API answered to a delete: either the object itself (finalizers
/// still pending) or a status document.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteResponse {
    Pending { name: Option<String> },
    Status(Value),
}

impl KubeGateway {
    pub async fn new(context: Option<String>, request_timeout: Duration) -> Result<Self> {
        let kubeconfig = match Kubeconfig::read() {
            Ok(kubeconfig) => Some(kubeconfig),
            Err(error) => {
                warn!("kubeconfig unavailable, falling back to inferred config: {error}");
                None
            }
        };

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context is unavailable in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster_url = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let active_context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());
        let active_user = kubeconfig
            .as_ref()
            .and_then(|cfg| {
                cfg.contexts
                    .iter()
                    .find(|named| named.name == active_context)
                    .and_then(|named| named.context.as_ref())
                    .and_then(|ctx| ctx.user.clone())
            })
            .unwrap_or_else(|| "-".to_string());

        info!(
            "connected cluster={cluster_url} context={active_context} user={active_user} default_namespace={default_namespace}"
        );

        Ok(Self {
            client,
            context: active_context,
            cluster: cluster_url,
            user: active_user,
            default_namespace,
            request_timeout,
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub async fn list_rules(&self, scope: &NamespaceScope) -> Result<Vec<Rule>> {
        let rules: Api<Rule> = self.scoped_api(scope);
        let list = self
            .bounded(&format!("list rules in {scope}"), rules.list(&ListParams::default()))
            .await?;
        debug!("listed {} rules scope={scope}", list.items.len());
        Ok(list.items)
    }

    pub async fn list_rule_endpoints(&self, scope: &NamespaceScope) -> Result<Vec<String>> {
        let endpoints: Api<RuleEndpoint> = self.scoped_api(scope);
        let list = self
            .bounded(
                &format!("list rule endpoints in {scope}"),
                endpoints.list(&ListParams::default()),
            )
            .await?;
        let mut names = list
            .into_iter()
            .map(|endpoint| endpoint.name_any())
            .collect::<Vec<_>>();
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .bounded("list namespaces", namespaces.list(&ListParams::default()))
            .await?;
        let mut names = list
            .into_iter()
            .map(|namespace| namespace.name_any())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>> {
        let bindings: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let list = self
            .bounded(
                "list cluster role bindings",
                bindings.list(&ListParams::default()),
            )
            .await?;
        debug!("listed {} cluster role bindings", list.items.len());
        Ok(list.items)
    }

    pub async fn create_rule(&self, namespace: &str, rule: &Rule) -> MutationOutcome {
        let rules: Api<Rule> = Api::namespaced(self.client.clone(), namespace);
        let outcome = self.create_with(&rules, rule).await;
        info!(
            "create rule {namespace}/{} outcome={outcome:?}",
            rule.name_any()
        );
        outcome
    }

    pub async fn create_binding(&self, binding: &ClusterRoleBinding) -> MutationOutcome {
        let bindings: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let outcome = self.create_with(&bindings, binding).await;
        info!(
            "create clusterrolebinding {} outcome={outcome:?}",
            binding.name_any()
        );
        outcome
    }

    pub async fn delete_rule(&self, namespace: &str, name: &str) -> MutationOutcome {
        let rules: Api<Rule> = Api::namespaced(self.client.clone(), namespace);
        let outcome = self.delete_with(&rules, name).await;
        info!("delete rule {namespace}/{name} outcome={outcome:?}");
        outcome
    }

    pub async fn delete_binding(&self, name: &str) -> MutationOutcome {
        let bindings: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let outcome = self.delete_with(&bindings, name).await;
        info!("delete clusterrolebinding {name} outcome={outcome:?}");
        outcome
    }

    /// Rules are read untyped so fields the local type does not model still
    /// show up in the manifest.
    pub async fn rule_yaml(&self, namespace: &str, name: &str) -> Result<String> {
        let resource = ApiResource::erase::<Rule>(&());
        let rules: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        let rule = self
            .bounded(&format!("get rule {namespace}/{name}"), rules.get(name))
            .await?;
        manifest_yaml(&rule)
    }

    pub async fn binding_yaml(&self, name: &str) -> Result<String> {
        let bindings: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let binding = self
            .bounded(
                &format!("get clusterrolebinding {name}"),
                bindings.get(name),
            )
            .await?;
        manifest_yaml(&binding)
    }

    fn scoped_api<K>(&self, scope: &NamespaceScope) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match scope {
            NamespaceScope::All => Api::all(self.client.clone()),
            NamespaceScope::Named(namespace) => Api::namespaced(self.client.clone(), namespace),
        }
    }

    async fn bounded<T, F>(&self, what: &str, request: F) -> Result<T>
    where
        F: Future<Output = kube::Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result.with_context(|| format!("failed to {what}")),
            Err(_) => {
                warn!("{what} timed out after {:?}", self.request_timeout);
                anyhow::bail!("{what} timed out after {:?}", self.request_timeout)
            }
        }
    }

    async fn create_with<K>(&self, api: &Api<K>, object: &K) -> MutationOutcome
    where
        K: Resource + Clone + Serialize + DeserializeOwned + Debug,
    {
        let params = PostParams::default();
        let request = api.create(&params, object);
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(created)) => create_outcome(created.meta()),
            Ok(Err(error)) => classify_error(&error),
            Err(_) => MutationOutcome::Failed(format!(
                "request timed out after {:?}",
                self.request_timeout
            )),
        }
    }

    async fn delete_with<K>(&self, api: &Api<K>, name: &str) -> MutationOutcome
    where
        K: Resource + Clone + DeserializeOwned + Debug,
    {
        let params = DeleteParams::default();
        let request = api.delete(name, &params);
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(response)) => {
                let response = response.either(
                    |object| DeleteResponse::Pending {
                        name: object.meta().name.clone(),
                    },
                    |status| DeleteResponse::Status(serde_json::to_value(status).unwrap_or_default()),
                );
                delete_outcome(&response, name)
            }
            Ok(Err(error)) => classify_error(&error),
            Err(_) => MutationOutcome::Failed(format!(
                "request timed out after {:?}",
                self.request_timeout
            )),
        }
    }
}

pub fn create_outcome(metadata: &ObjectMeta) -> MutationOutcome {
    if metadata.creation_timestamp.is_some() {
        MutationOutcome::Succeeded
    } else {
        MutationOutcome::Rejected(MISSING_CREATION_TIMESTAMP.to_string())
    }
}

pub fn delete_outcome(response: &DeleteResponse, requested: &str) -> MutationOutcome {
    match response {
        DeleteResponse::Pending { name } if name.as_deref() == Some(requested) => {
            MutationOutcome::Succeeded
        }
        DeleteResponse::Pending { .. } => MutationOutcome::Rejected(UNCONFIRMED_DELETE.to_string()),
        DeleteResponse::Status(status)
            if status.get("status").and_then(Value::as_str) == Some("Success") =>
        {
            MutationOutcome::Succeeded
        }
        DeleteResponse::Status(status) => MutationOutcome::Rejected(
            status
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .unwrap_or(UNCONFIRMED_DELETE)
                .to_string(),
        ),
    }
}

pub fn classify_error(error: &kube::Error) -> MutationOutcome {
    match error {
        kube::Error::Api(response) => {
            let message = response.message.trim();
            if message.is_empty() {
                MutationOutcome::Rejected(format!("request rejected ({})", response.code))
            } else {
                MutationOutcome::Rejected(message.to_string())
            }
        }
        other => MutationOutcome::Failed(other.to_string()),
    }
}

fn manifest_yaml<T>(value: &T) -> Result<String>
where
    T: Serialize,
{
    serde_yaml::to_string(value).context("failed to format manifest as YAML")
}

#[cfg(test)]
mod tests {
    use super::{DeleteResponse, classify_error, create_outcome, delete_outcome, manifest_yaml};
    use kube::core::Status;
    use crate::model::MutationOutcome;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use serde_json::json;

    #[test]
    fn create_with_timestamp_succeeds() {
        let metadata = ObjectMeta {
            name: Some("r1".into()),
            creation_timestamp: Some(Time("2024-03-01T10:00:00Z".parse().expect("timestamp"))),
            ..ObjectMeta::default()
        };
        assert_eq!(create_outcome(&metadata), MutationOutcome::Succeeded);
    }

    #[test]
    fn create_without_timestamp_is_rejected() {
        let metadata = ObjectMeta {
            name: Some("r1".into()),
            ..ObjectMeta::default()
        };
        assert!(matches!(
            create_outcome(&metadata),
            MutationOutcome::Rejected(_)
        ));
    }

    #[test]
    fn delete_status_success_counts() {
        let response = DeleteResponse::Status(json!({"status": "Success", "kind": "Status"}));
        assert_eq!(delete_outcome(&response, "r1"), MutationOutcome::Succeeded);
    }

    #[test]
    fn delete_echoing_requested_object_counts() {
        let response = DeleteResponse::Pending {
            name: Some("r1".into()),
        };
        assert_eq!(delete_outcome(&response, "r1"), MutationOutcome::Succeeded);
    }

    #[test]
    fn delete_echoing_other_object_is_rejected() {
        let response = DeleteResponse::Pending {
            name: Some("r2".into()),
        };
        assert!(matches!(
            delete_outcome(&response, "r1"),
            MutationOutcome::Rejected(_)
        ));
    }

    #[test]
    fn delete_failure_status_surfaces_server_message() {
        let response = DeleteResponse::Status(json!({
            "status": "Failure",
            "message": "rules.rules.kubeedge.io \"r1\" is forbidden"
        }));
        assert_eq!(
            delete_outcome(&response, "r1"),
            MutationOutcome::Rejected("rules.rules.kubeedge.io \"r1\" is forbidden".into())
        );
    }

    #[test]
    fn delete_failure_without_message_uses_fallback() {
        let response = DeleteResponse::Status(json!({"status": "Failure", "message": "  "}));
        assert_eq!(
            delete_outcome(&response, "r1"),
            MutationOutcome::Rejected("deletion was not confirmed by the server".into())
        );
    }

    #[test]
    fn api_error_message_is_shown_verbatim() {
        let error = kube::Error::Api(
            Status::failure("rules.rules.kubeedge.io \"r1\" already exists", "AlreadyExists")
                .with_code(409)
                .boxed(),
        );
        assert_eq!(
            classify_error(&error),
            MutationOutcome::Rejected("rules.rules.kubeedge.io \"r1\" already exists".into())
        );
    }

    #[test]
    fn api_error_without_message_reports_code() {
        let error = kube::Error::Api(Status::failure("  ", "Conflict").with_code(409).boxed());
        assert_eq!(
            classify_error(&error),
            MutationOutcome::Rejected("request rejected (409)".into())
        );
    }

    #[test]
    fn non_api_error_is_a_transport_failure() {
        let error = kube::Error::TlsRequired;
        assert!(matches!(classify_error(&error), MutationOutcome::Failed(_)));
    }

    #[test]
    fn manifest_yaml_renders_nested_fields() {
        let yaml = manifest_yaml(&json!({"metadata": {"name": "r1"}})).expect("yaml");
        assert!(yaml.contains("name: r1"));
    }
}
