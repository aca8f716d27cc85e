use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Action, ActionBlock, ActionCreate, ApiKeyScope, AuthMechanism, ConditionSet, DerivedRoleRule,
    Relation, RelationCreate, Resource, ResourceCreate, ResourceRole, ResourceUpdate, Role,
    RoleCreate, RoleUpdate, UrlMapping, UrlMappingsRequest,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Page size used by every listing call
pub const PAGE_SIZE: usize = 100;

/// Operations the processors and the exporter need from the Permit API.
///
/// Every method is a single round trip, except the `list_*` calls which
/// follow pagination until the collection is exhausted.
#[async_trait]
pub trait PermitApi: Send + Sync {
    async fn list_resources(&self) -> ApiResult<Vec<Resource>>;

    async fn create_resource(&self, key: &str, name: &str) -> ApiResult<Resource>;

    async fn update_resource(&self, key: &str, name: &str) -> ApiResult<Resource>;

    async fn create_action(
        &self,
        resource_key: &str,
        action_key: &str,
        description: &str,
    ) -> ApiResult<Action>;

    async fn list_roles(&self) -> ApiResult<Vec<Role>>;

    async fn create_role(&self, role: &RoleCreate) -> ApiResult<Role>;

    async fn update_role(&self, role_key: &str, update: &RoleUpdate) -> ApiResult<Role>;

    async fn list_resource_roles(&self, resource_key: &str) -> ApiResult<Vec<ResourceRole>>;

    async fn create_resource_role(
        &self,
        resource_key: &str,
        role: &RoleCreate,
    ) -> ApiResult<ResourceRole>;

    async fn update_resource_role(
        &self,
        resource_key: &str,
        role_key: &str,
        update: &RoleUpdate,
    ) -> ApiResult<ResourceRole>;

    async fn get_relation_by_key(
        &self,
        object_resource: &str,
        relation_key: &str,
    ) -> ApiResult<Relation>;

    async fn list_relations(&self, object_resource: &str) -> ApiResult<Vec<Relation>>;

    async fn create_relation(
        &self,
        object_resource: &str,
        relation: &RelationCreate,
    ) -> ApiResult<Relation>;

    async fn create_derived_role(
        &self,
        resource_key: &str,
        role_key: &str,
        rule: &DerivedRoleRule,
    ) -> ApiResult<DerivedRoleRule>;

    async fn list_condition_sets(&self) -> ApiResult<Vec<ConditionSet>>;

    async fn delete_url_mappings(&self, source: &str) -> ApiResult<()>;

    async fn create_url_mappings(
        &self,
        mappings: &[UrlMapping],
        auth_type: &str,
        token_header_name: &str,
    ) -> ApiResult<Vec<UrlMapping>>;
}

/// reqwest-backed implementation of [`PermitApi`]
#[derive(Debug, Clone)]
pub struct HttpPermitClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    project: String,
    environment: String,
}

impl HttpPermitClient {
    /// Build a client, resolving project and environment from the API key
    /// scope when the configuration does not pin them
    pub async fn connect(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let (project, environment) = match (config.project.clone(), config.environment.clone()) {
            (Some(project), Some(environment)) => (project, environment),
            (project, environment) => {
                let scope = fetch_scope(&http, &config).await?;
                let project = project.or(scope.project_id).ok_or_else(|| {
                    ApiError::Config(
                        "API key is not scoped to a project; pass a project explicitly".to_string(),
                    )
                })?;
                let environment = environment.or(scope.environment_id).ok_or_else(|| {
                    ApiError::Config(
                        "API key is not scoped to an environment; pass an environment explicitly"
                            .to_string(),
                    )
                })?;
                (project, environment)
            }
        };

        info!(
            "Using Permit API at {} (project: {}, environment: {})",
            config.base_url(),
            project,
            environment
        );

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key,
            project,
            environment,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// URL of an endpoint under the environment's policy schema
    fn schema_url(&self, path: &str) -> String {
        format!(
            "{}/v2/schema/{}/{}/{}",
            self.base_url, self.project, self.environment, path
        )
    }

    /// URL of an endpoint under the environment's facts API
    fn facts_url(&self, path: &str) -> String {
        format!(
            "{}/v2/facts/{}/{}/{}",
            self.base_url, self.project, self.environment, path
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    async fn send_json<B, T>(&self, method: Method, url: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.request(method, url).json(body).send().await?;
        read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self.request(Method::GET, url).send().await?;
        read_json(response).await
    }

    /// Walk `page`/`per_page` pagination until a short page comes back
    async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .request(Method::GET, url)
                .query(&[("page", page), ("per_page", PAGE_SIZE)])
                .send()
                .await?;
            let batch: Vec<T> = read_json(response).await?;
            let fetched = batch.len();
            items.extend(batch);

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} item(s) from {}", items.len(), url);
        Ok(items)
    }
}

#[async_trait]
impl PermitApi for HttpPermitClient {
    async fn list_resources(&self) -> ApiResult<Vec<Resource>> {
        self.get_paged(&self.schema_url("resources")).await
    }

    async fn create_resource(&self, key: &str, name: &str) -> ApiResult<Resource> {
        let body = ResourceCreate {
            key: key.to_string(),
            name: name.to_string(),
            actions: BTreeMap::<String, ActionBlock>::new(),
        };
        self.send_json(Method::POST, &self.schema_url("resources"), &body)
            .await
    }

    async fn update_resource(&self, key: &str, name: &str) -> ApiResult<Resource> {
        let body = ResourceUpdate {
            name: name.to_string(),
        };
        let url = self.schema_url(&format!("resources/{}", key));
        self.send_json(Method::PATCH, &url, &body).await
    }

    async fn create_action(
        &self,
        resource_key: &str,
        action_key: &str,
        description: &str,
    ) -> ApiResult<Action> {
        let body = ActionCreate {
            key: action_key.to_string(),
            name: action_key.to_string(),
            description: description.to_string(),
        };
        let url = self.schema_url(&format!("resources/{}/actions", resource_key));
        self.send_json(Method::POST, &url, &body).await
    }

    async fn list_roles(&self) -> ApiResult<Vec<Role>> {
        self.get_paged(&self.schema_url("roles")).await
    }

    async fn create_role(&self, role: &RoleCreate) -> ApiResult<Role> {
        self.send_json(Method::POST, &self.schema_url("roles"), role)
            .await
    }

    async fn update_role(&self, role_key: &str, update: &RoleUpdate) -> ApiResult<Role> {
        let url = self.schema_url(&format!("roles/{}", role_key));
        self.send_json(Method::PATCH, &url, update).await
    }

    async fn list_resource_roles(&self, resource_key: &str) -> ApiResult<Vec<ResourceRole>> {
        let url = self.schema_url(&format!("resources/{}/roles", resource_key));
        self.get_paged(&url).await
    }

    async fn create_resource_role(
        &self,
        resource_key: &str,
        role: &RoleCreate,
    ) -> ApiResult<ResourceRole> {
        let url = self.schema_url(&format!("resources/{}/roles", resource_key));
        self.send_json(Method::POST, &url, role).await
    }

    async fn update_resource_role(
        &self,
        resource_key: &str,
        role_key: &str,
        update: &RoleUpdate,
    ) -> ApiResult<ResourceRole> {
        let url = self.schema_url(&format!("resources/{}/roles/{}", resource_key, role_key));
        self.send_json(Method::PATCH, &url, update).await
    }

    async fn get_relation_by_key(
        &self,
        object_resource: &str,
        relation_key: &str,
    ) -> ApiResult<Relation> {
        let url = self.schema_url(&format!(
            "resources/{}/relations/{}",
            object_resource, relation_key
        ));
        self.get_json(&url).await
    }

    async fn list_relations(&self, object_resource: &str) -> ApiResult<Vec<Relation>> {
        let url = self.schema_url(&format!("resources/{}/relations", object_resource));
        self.get_paged(&url).await
    }

    async fn create_relation(
        &self,
        object_resource: &str,
        relation: &RelationCreate,
    ) -> ApiResult<Relation> {
        let url = self.schema_url(&format!("resources/{}/relations", object_resource));
        self.send_json(Method::POST, &url, relation).await
    }

    async fn create_derived_role(
        &self,
        resource_key: &str,
        role_key: &str,
        rule: &DerivedRoleRule,
    ) -> ApiResult<DerivedRoleRule> {
        let url = self.schema_url(&format!(
            "resources/{}/roles/{}/implicit_grants",
            resource_key, role_key
        ));
        self.send_json(Method::POST, &url, rule).await
    }

    async fn list_condition_sets(&self) -> ApiResult<Vec<ConditionSet>> {
        self.get_paged(&self.schema_url("condition_sets")).await
    }

    async fn delete_url_mappings(&self, source: &str) -> ApiResult<()> {
        let url = self.facts_url(&format!("url_mappings/{}", source));
        let response = self.request(Method::DELETE, &url).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn create_url_mappings(
        &self,
        mappings: &[UrlMapping],
        auth_type: &str,
        token_header_name: &str,
    ) -> ApiResult<Vec<UrlMapping>> {
        let body = UrlMappingsRequest {
            mappings,
            auth_mechanism: AuthMechanism {
                auth_type: auth_type.to_string(),
                token_header_name: token_header_name.to_string(),
            },
        };
        let response = self
            .request(Method::POST, &self.facts_url("url_mappings"))
            .json(&body)
            .send()
            .await?;
        let text = ensure_success(response).await?;

        // The endpoint answers with either the stored list or an empty body
        if text.trim().is_empty() {
            return Ok(mappings.to_vec());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

async fn fetch_scope(http: &reqwest::Client, config: &ClientConfig) -> ApiResult<ApiKeyScope> {
    let url = format!("{}/v2/api-key/scope", config.base_url());
    debug!("GET {}", url);
    let response = http
        .get(&url)
        .bearer_auth(&config.api_key)
        .header("Accept", "application/json")
        .send()
        .await?;
    read_json(response).await
}

/// Turn a non-2xx response into [`ApiError::Http`], returning the body text otherwise
async fn ensure_success(response: Response) -> ApiResult<String> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        Ok(text)
    } else {
        Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(&text, status.canonical_reason().unwrap_or("request failed")),
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let text = ensure_success(response).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Pick the most useful message out of an error body
fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "detail"] {
            match value.get(field) {
                Some(serde_json::Value::String(message)) => return message.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpPermitClient {
        HttpPermitClient {
            http: reqwest::Client::new(),
            base_url: "https://api.permit.io".to_string(),
            api_key: "permit_key_test".to_string(),
            project: "default".to_string(),
            environment: "dev".to_string(),
        }
    }

    #[test]
    fn test_schema_and_facts_urls() {
        let client = client();
        assert_eq!(
            client.schema_url("resources/order/actions"),
            "https://api.permit.io/v2/schema/default/dev/resources/order/actions"
        );
        assert_eq!(
            client.facts_url("url_mappings/openapi"),
            "https://api.permit.io/v2/facts/default/dev/url_mappings/openapi"
        );
    }

    #[test]
    fn test_error_message_prefers_message_then_detail() {
        assert_eq!(
            error_message(r#"{"message": "Resource already exists", "detail": "x"}"#, "Conflict"),
            "Resource already exists"
        );
        assert_eq!(
            error_message(r#"{"detail": [{"loc": ["body"]}]}"#, "Unprocessable"),
            r#"[{"loc":["body"]}]"#
        );
        assert_eq!(error_message("gateway timeout", "Bad Gateway"), "gateway timeout");
        assert_eq!(error_message("", "Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config_without_network() {
        let err = HttpPermitClient::connect(ClientConfig::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_with_pinned_scope_skips_lookup() {
        let config = ClientConfig::new("permit_key_test")
            .with_api_url("http://127.0.0.1:9")
            .with_scope("proj", "env");
        let client = HttpPermitClient::connect(config).await.unwrap();
        assert_eq!(client.project(), "proj");
        assert_eq!(client.environment(), "env");
    }
}
