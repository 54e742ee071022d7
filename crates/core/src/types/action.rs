//! Tool-call wire format used by agent runtimes.
//!
//! An agent invokes one named operation with a list of name/value
//! parameters, either top-level or under
//! `requestBody.content["application/json"]` (as a list or as
//! `{"properties": [...]}`), and reads back `{status, result}`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Media type under which request-body parameters are nested.
const JSON_CONTENT: &str = "application/json";

/// One name/value argument of a tool call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ActionParameter {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Request-body parameters, as a bare list or wrapped in `properties`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ActionParameterList {
    List(Vec<ActionParameter>),
    Properties {
        #[serde(default)]
        properties: Vec<ActionParameter>,
    },
}

impl ActionParameterList {
    fn parameters(&self) -> &[ActionParameter] {
        match self {
            Self::List(list) => list,
            Self::Properties { properties } => properties,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ActionRequestBody {
    #[serde(default)]
    pub content: BTreeMap<String, ActionParameterList>,
}

/// `POST /actions` body.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ActionInvocation {
    /// Operation to run: `getAdvice`, `subscribeToAgent`, `checkUser` or
    /// `checkPermissions`. A leading `/` is ignored.
    #[serde(alias = "apiPath", alias = "function")]
    pub action: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default, rename = "requestBody")]
    pub request_body: Option<ActionRequestBody>,
}

impl ActionInvocation {
    /// Operation name without a leading `/`.
    pub fn operation(&self) -> &str {
        self.action.trim().trim_start_matches('/')
    }

    /// Arguments by name. Request-body parameters win over top-level ones;
    /// null values are skipped and non-string values keep their JSON text.
    pub fn arguments(&self) -> BTreeMap<String, String> {
        let nested = self
            .request_body
            .as_ref()
            .and_then(|body| body.content.get(JSON_CONTENT))
            .map(ActionParameterList::parameters)
            .unwrap_or_default();

        self.parameters
            .iter()
            .chain(nested)
            .filter_map(|param| {
                let value = match &param.value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((param.name.clone(), value))
            })
            .collect()
    }
}

/// Outcome flag of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Success,
    Error,
}

/// `POST /actions` response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActionResult {
    pub action: String,
    pub status: ActionStatus,
    pub result: serde_json::Value,
}

impl ActionResult {
    pub fn success(action: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            status: ActionStatus::Success,
            result,
        }
    }

    pub fn error(action: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            status: ActionStatus::Error,
            result,
        }
    }
}
