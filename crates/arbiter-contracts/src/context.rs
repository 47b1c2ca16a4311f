//! The immutable request context judged by policies.
//!
//! A `RequestContext` is built once per inbound request by the gateway and
//! never mutated during evaluation. Concurrent evaluators observe identical
//! values because nothing in the pipeline takes `&mut` access to it.

use serde::{Deserialize, Serialize};

use crate::error::{ArbiterError, ArbiterResult};

/// Everything the policy evaluator needs to judge one request.
///
/// Construct via [`RequestContext::builder`] so the required-field
/// validation mirrors what the gateway enforces at the boundary.
/// `metadata` is an open bag for extension fields; policies address nested
/// values with dotted paths (`user.role` resolves inside `metadata`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Who initiated the request (user id, service account, agent id).
    pub actor_id: String,
    /// Role of the actor (admin, operator, developer, auditor, ...).
    pub actor_role: String,
    /// The resource being acted on (model id, agent id, dataset id, ...).
    pub resource_id: String,
    /// Type of resource (model, agent, data, ...).
    pub resource_type: String,
    /// Deployment environment (development, staging, production).
    pub environment: String,
    /// Declared purpose of the action (generation, tool_call, data_access, ...).
    pub intent: String,
    /// Classification tags (pii, financial, banned, ...).
    pub tags: Vec<String>,
    /// Open key/value bag for extension fields; supports nested objects.
    pub metadata: serde_json::Value,
}

impl RequestContext {
    /// Start building a context for the given actor and resource.
    pub fn builder(actor_id: impl Into<String>, resource_id: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            actor_id: actor_id.into(),
            actor_role: String::new(),
            resource_id: resource_id.into(),
            resource_type: String::new(),
            environment: String::new(),
            intent: String::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Resolve a dotted field path against this context.
    ///
    /// Top-level names (`actor_id`, `environment`, `tags`, ...) resolve to
    /// the corresponding field. Any other path — including paths prefixed
    /// with `metadata.` — descends into the metadata bag one segment at a
    /// time. A missing path yields `None`, never an error: the evaluator's
    /// never-throw guarantee starts here.
    pub fn lookup(&self, path: &str) -> Option<serde_json::Value> {
        match path {
            "actor_id" => return Some(serde_json::Value::String(self.actor_id.clone())),
            "actor_role" => return Some(serde_json::Value::String(self.actor_role.clone())),
            "resource_id" => return Some(serde_json::Value::String(self.resource_id.clone())),
            "resource_type" => return Some(serde_json::Value::String(self.resource_type.clone())),
            "environment" => return Some(serde_json::Value::String(self.environment.clone())),
            "intent" => return Some(serde_json::Value::String(self.intent.clone())),
            "tags" => {
                return Some(serde_json::Value::Array(
                    self.tags
                        .iter()
                        .map(|t| serde_json::Value::String(t.clone()))
                        .collect(),
                ))
            }
            "metadata" => return Some(self.metadata.clone()),
            _ => {}
        }

        // Dotted access into the metadata bag, with or without the
        // explicit "metadata." prefix.
        let path = path.strip_prefix("metadata.").unwrap_or(path);
        let mut current = &self.metadata;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }
}

/// Builder for [`RequestContext`] with required-field validation on `build()`.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    actor_id: String,
    actor_role: String,
    resource_id: String,
    resource_type: String,
    environment: String,
    intent: String,
    tags: Vec<String>,
    metadata: serde_json::Value,
}

impl ContextBuilder {
    pub fn actor_role(mut self, role: impl Into<String>) -> Self {
        self.actor_role = role.into();
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = intent.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate required fields and freeze the context.
    ///
    /// `actor_id`, `resource_id`, and `environment` must be non-empty;
    /// anything else may legitimately be blank for anonymous or
    /// untyped requests.
    pub fn build(self) -> ArbiterResult<RequestContext> {
        if self.actor_id.is_empty() {
            return Err(ArbiterError::Config {
                reason: "request context requires a non-empty actor_id".to_string(),
            });
        }
        if self.resource_id.is_empty() {
            return Err(ArbiterError::Config {
                reason: "request context requires a non-empty resource_id".to_string(),
            });
        }
        if self.environment.is_empty() {
            return Err(ArbiterError::Config {
                reason: "request context requires a non-empty environment".to_string(),
            });
        }

        Ok(RequestContext {
            actor_id: self.actor_id,
            actor_role: self.actor_role,
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            environment: self.environment,
            intent: self.intent,
            tags: self.tags,
            metadata: self.metadata,
        })
    }
}
