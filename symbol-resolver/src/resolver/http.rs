//! Live catalog resolver over HTTP.
//!
//! Reads `GET {base}/deviceManagement/configurationSettings/{definitionId}`
//! from a Graph-style management API.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::traits::*;

/// HTTP-backed definition catalog.
pub struct HttpSymbolResolver {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpSymbolResolver {
    /// Create a resolver for the given API base URL.
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    /// Resolver for the public Graph beta endpoint.
    pub fn graph_beta(bearer_token: impl Into<String>) -> Self {
        Self::new("https://graph.microsoft.com/beta", Some(bearer_token.into()))
    }

    fn definition_url(&self, definition_id: &str) -> String {
        format!(
            "{}/deviceManagement/configurationSettings/{}",
            self.base_url, definition_id
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.bearer_token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }
}

/// Definition as returned by the catalog endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionResponse {
    id: String,
    display_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    options: Option<Vec<OptionResponse>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionResponse {
    item_id: String,
    display_name: Option<String>,
    description: Option<String>,
    option_value: Option<OptionValueResponse>,
}

#[derive(Debug, Deserialize)]
struct OptionValueResponse {
    value: Option<Value>,
}

impl From<DefinitionResponse> for CatalogDefinition {
    fn from(response: DefinitionResponse) -> Self {
        Self {
            id: response.id,
            display_name: response.display_name,
            description: response.description,
            options: response
                .options
                .unwrap_or_default()
                .into_iter()
                .map(|o| DefinitionOption {
                    item_id: o.item_id,
                    display_name: o.display_name,
                    description: o.description,
                    option_value: o.option_value.and_then(|v| v.value),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SymbolResolver for HttpSymbolResolver {
    fn id(&self) -> &str {
        &self.base_url
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/deviceManagement/configurationSettings?$top=1", self.base_url);
        self.get(&url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn fetch_definition(&self, definition_id: &str) -> Result<CatalogDefinition, ResolveError> {
        let response = self
            .get(&self.definition_url(definition_id))
            .send()
            .await
            .map_err(|e| ResolveError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound(definition_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Unavailable(format!("HTTP {}: {}", status, body)));
        }

        let definition: DefinitionResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::ParseError(e.to_string()))?;

        tracing::debug!(
            definition_id = %definition_id,
            options = definition.options.as_ref().map_or(0, Vec::len),
            "Fetched setting definition"
        );
        Ok(definition.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_definition_parses_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deviceManagement/configurationSettings/vendor_defender_rtp"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "vendor_defender_rtp",
                "displayName": "Allow Realtime Monitoring",
                "options": [
                    {
                        "itemId": "vendor_defender_rtp_0",
                        "displayName": "Not allowed",
                        "optionValue": { "@odata.type": "#microsoft.graph.deviceManagementConfigurationIntegerSettingValue", "value": 0 }
                    },
                    { "itemId": "vendor_defender_rtp_1", "displayName": "Allowed" }
                ]
            })))
            .mount(&server)
            .await;

        let resolver = HttpSymbolResolver::new(server.uri(), Some("token-1".to_string()));
        let definition = resolver.fetch_definition("vendor_defender_rtp").await.unwrap();

        assert_eq!(definition.display_name.as_deref(), Some("Allow Realtime Monitoring"));
        assert_eq!(definition.options.len(), 2);
        assert_eq!(
            definition.option_for("vendor_defender_rtp_0").and_then(|o| o.decoded_value()),
            Some(json!(0))
        );
        assert_eq!(
            definition.option_for("vendor_defender_rtp_1").and_then(|o| o.decoded_value()),
            Some(json!("Allowed"))
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deviceManagement/configurationSettings/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deviceManagement/configurationSettings/busy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let resolver = HttpSymbolResolver::new(format!("{}/", server.uri()), None);
        assert!(matches!(
            resolver.fetch_definition("missing").await,
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            resolver.fetch_definition("busy").await,
            Err(ResolveError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let resolver = HttpSymbolResolver::new("http://127.0.0.1:9", None);
        assert!(!resolver.is_available().await);
        assert!(matches!(
            resolver.fetch_definition("anything").await,
            Err(ResolveError::NetworkError(_))
        ));
    }
}
