//! Invocation envelope types.
//!
//! The agent calls an action with a JSON event naming the `apiPath` and
//! carrying the action's inputs as a property list; the reply wraps the body
//! in a response envelope keyed by media type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Media type used for request and response bodies.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Envelope version written on every response.
pub const MESSAGE_VERSION: &str = "1.0";

/// Name of the property that carries the SQL text.
pub const QUERY_PROPERTY: &str = "query";

/// An action invocation from the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    #[serde(default)]
    pub message_version: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub action_group: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ActionProperty>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
}

/// Request body, keyed by media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: BTreeMap<String, MediaContent>,
}

/// Properties sent under one media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub properties: Vec<ActionProperty>,
}

/// A single named input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProperty {
    pub name: String,
    #[serde(rename = "type", default = "default_property_type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

fn default_property_type() -> String {
    "string".to_string()
}

impl ActionProperty {
    /// Creates a string property.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: default_property_type(),
            value: value.into(),
        }
    }
}

impl ActionEvent {
    /// Builds a POST invocation carrying `sql` as the `query` body property.
    pub fn query(
        action_group: impl Into<String>,
        api_path: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        let mut content = BTreeMap::new();
        content.insert(
            JSON_MEDIA_TYPE.to_string(),
            MediaContent {
                properties: vec![ActionProperty::string(QUERY_PROPERTY, sql)],
            },
        );

        Self {
            message_version: Some(MESSAGE_VERSION.to_string()),
            action_group: Some(action_group.into()),
            api_path: Some(api_path.into()),
            http_method: Some("POST".to_string()),
            request_body: Some(RequestBody { content }),
            ..Default::default()
        }
    }

    /// Sets the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Finds the query text in the body properties, then in the parameters.
    ///
    /// A property named `query` wins; otherwise the first non-empty value is used.
    pub fn query_text(&self) -> Option<&str> {
        let body_properties = self
            .request_body
            .as_ref()
            .and_then(|body| body.content.get(JSON_MEDIA_TYPE))
            .map(|media| media.properties.as_slice())
            .unwrap_or_default();

        scan_properties(body_properties).or_else(|| scan_properties(&self.parameters))
    }
}

fn scan_properties(properties: &[ActionProperty]) -> Option<&str> {
    let non_empty = |p: &&ActionProperty| !p.value.trim().is_empty();

    properties
        .iter()
        .filter(non_empty)
        .find(|p| p.name.eq_ignore_ascii_case(QUERY_PROPERTY))
        .or_else(|| properties.iter().find(non_empty))
        .map(|p| p.value.as_str())
}

/// The envelope returned to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message_version: String,
    pub response: ActionResult,
}

/// Routing echo, status code and body of one action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action_group: Option<String>,
    pub api_path: Option<String>,
    pub http_method: Option<String>,
    pub http_status_code: u16,
    pub response_body: BTreeMap<String, ResponseBody>,
}

/// A response body under one media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub body: serde_json::Value,
}

impl ActionResponse {
    /// Wraps `body` in a response envelope echoing the event's routing fields.
    pub fn new(event: &ActionEvent, http_status_code: u16, body: serde_json::Value) -> Self {
        let mut response_body = BTreeMap::new();
        response_body.insert(JSON_MEDIA_TYPE.to_string(), ResponseBody { body });

        Self {
            message_version: MESSAGE_VERSION.to_string(),
            response: ActionResult {
                action_group: event.action_group.clone(),
                api_path: event.api_path.clone(),
                http_method: event.http_method.clone(),
                http_status_code,
                response_body,
            },
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.response.http_status_code
    }

    /// Returns the JSON body, if present.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.response
            .response_body
            .get(JSON_MEDIA_TYPE)
            .map(|content| &content.body)
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }
}
