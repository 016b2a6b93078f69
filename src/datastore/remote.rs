//! Remote backend
//!
//! Speaks the Cloud Datastore v1 REST API (`beginTransaction`, `commit`,
//! `rollback`, `runQuery`) over blocking HTTP. Pointed at an emulator via
//! `DATASTORE_EMULATOR_HOST`, requests are sent unauthenticated; against the
//! production endpoint every request carries a bearer token, either the one
//! configured or one minted from the service-account key.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use crate::config::BenchConfig;
use crate::credentials::{ServiceAccount, TokenSource};
use crate::error::{Result, StoreError};

use super::{Backend, Cursor, EntityRecord, Key, Mutation, Query, QueryBatch, TransactionId, Value};

/// HTTP connection to a Datastore project
pub struct RemoteBackend {
    http: reqwest::blocking::Client,
    base_url: String,
    project_id: String,
    /// `None` against an emulator
    auth: Option<TokenSource>,
}

impl RemoteBackend {
    /// Resolve the project and build the HTTP client
    ///
    /// The project comes from `config.project_id`, falling back to the
    /// credential file. No request is made here; a bad endpoint shows up on
    /// the first call.
    pub fn connect(config: &BenchConfig) -> Result<Self> {
        let account = config
            .credential_path
            .as_deref()
            .map(ServiceAccount::load)
            .transpose()?;

        let project_id = match (&config.project_id, &account) {
            (Some(project), _) => project.clone(),
            (None, Some(account)) => account.require_project_id()?.to_string(),
            (None, None) => {
                return Err(StoreError::Credentials(
                    "no project id: set CREDENTIAL_FILE_PATH or pass --project".to_string(),
                ))
            }
        };

        // Emulators take no credentials; an explicit token wins over the key
        let auth = if config.emulator_host.is_some() {
            None
        } else if let Some(token) = &config.access_token {
            Some(TokenSource::Static(token.clone()))
        } else if let Some(account) = &account {
            Some(TokenSource::from_service_account(account)?)
        } else {
            return Err(StoreError::Credentials(
                "the production endpoint needs a credential file (CREDENTIAL_FILE_PATH) or an access token"
                    .to_string(),
            ));
        };

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let base_url = config.base_url(&project_id);
        tracing::info!(
            "Remote backend: {} as {} ({})",
            base_url,
            account
                .as_ref()
                .and_then(|a| a.client_email.as_deref())
                .unwrap_or("<anonymous>"),
            auth.as_ref().map_or("unauthenticated", TokenSource::describe)
        );

        Ok(Self {
            http,
            base_url,
            project_id,
            auth,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn call<Req: Serialize, Resp: DeserializeOwned>(&self, method: &str, body: &Req) -> Result<Resp> {
        let url = format!("{}:{}", self.base_url, method);
        let mut request = self.http.post(&url).json(body);
        if let Some(auth) = &self.auth {
            request = request.bearer_auth(auth.bearer_token(&self.http)?);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::debug!("{} failed with {}: {}", method, status, body);
            return Err(error_from_response(status.as_u16(), &body));
        }
        Ok(response.json()?)
    }
}

impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn begin_transaction(&self) -> Result<TransactionId> {
        let response: wire::BeginTransactionResponse =
            self.call("beginTransaction", &wire::BeginTransactionRequest {})?;
        Ok(TransactionId(response.transaction))
    }

    fn commit(&self, transaction: Option<&TransactionId>, mutations: Vec<Mutation>) -> Result<()> {
        let request = wire::CommitRequest {
            mode: if transaction.is_some() {
                "TRANSACTIONAL"
            } else {
                "NON_TRANSACTIONAL"
            },
            transaction: transaction.map(|t| t.0.clone()),
            mutations: mutations
                .iter()
                .map(|m| wire::MutationJson {
                    upsert: entity_to_json(&self.project_id, m.record()),
                })
                .collect(),
        };
        let _: IgnoredAny = self.call("commit", &request)?;
        Ok(())
    }

    fn rollback(&self, transaction: &TransactionId) -> Result<()> {
        let request = wire::RollbackRequest {
            transaction: transaction.0.clone(),
        };
        let _: IgnoredAny = self.call("rollback", &request)?;
        Ok(())
    }

    fn run_query(
        &self,
        query: &Query,
        transaction: Option<&TransactionId>,
        start: Option<&Cursor>,
        page_size: usize,
    ) -> Result<QueryBatch> {
        let request = query_to_json(&self.project_id, query, transaction, start, page_size);
        let response: wire::RunQueryResponse = self.call("runQuery", &request)?;
        batch_from_json(response.batch)
    }
}

// =============================================================================
// REST JSON mapping
// =============================================================================

fn key_to_json(project_id: &str, key: &Key) -> wire::KeyJson {
    wire::KeyJson {
        partition_id: Some(wire::PartitionId {
            project_id: project_id.to_string(),
            namespace_id: None,
        }),
        path: key
            .path()
            .into_iter()
            .map(|(kind, name)| wire::PathElement {
                kind: kind.to_string(),
                name: Some(name.to_string()),
                id: None,
            })
            .collect(),
    }
}

fn key_from_json(key: wire::KeyJson) -> Result<Key> {
    let mut current: Option<Key> = None;
    for element in key.path {
        let name = element
            .name
            .or(element.id)
            .ok_or_else(|| StoreError::InvalidKey(format!("incomplete {} key from store", element.kind)))?;
        current = Some(match current {
            Some(parent) => Key::with_parent(element.kind, name, parent),
            None => Key::new(element.kind, name),
        });
    }
    current.ok_or_else(|| StoreError::InvalidKey("empty key path from store".to_string()))
}

fn value_to_json(project_id: &str, value: &Value) -> wire::ValueJson {
    let mut json = wire::ValueJson::default();
    match value {
        Value::Null => json.null_value = Some(serde_json::Value::Null),
        Value::String(s) => json.string_value = Some(s.clone()),
        Value::Integer(i) => json.integer_value = Some(i.to_string()),
        Value::Boolean(b) => json.boolean_value = Some(*b),
        Value::Key(k) => json.key_value = Some(key_to_json(project_id, k)),
    }
    json
}

fn value_from_json(value: wire::ValueJson) -> Result<Value> {
    if let Some(s) = value.string_value {
        return Ok(Value::String(s));
    }
    if let Some(i) = value.integer_value {
        let parsed = i
            .parse()
            .map_err(|_| StoreError::Serialization(format!("bad integerValue {:?}", i)))?;
        return Ok(Value::Integer(parsed));
    }
    if let Some(b) = value.boolean_value {
        return Ok(Value::Boolean(b));
    }
    if let Some(k) = value.key_value {
        return Ok(Value::Key(key_from_json(k)?));
    }
    Ok(Value::Null)
}

fn entity_to_json(project_id: &str, record: &EntityRecord) -> wire::EntityJson {
    wire::EntityJson {
        key: key_to_json(project_id, &record.key),
        properties: record
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(project_id, value)))
            .collect(),
    }
}

fn entity_from_json(entity: wire::EntityJson) -> Result<EntityRecord> {
    let key = key_from_json(entity.key)?;
    let mut properties = BTreeMap::new();
    for (name, value) in entity.properties {
        properties.insert(name, value_from_json(value)?);
    }
    Ok(EntityRecord::new(key, properties))
}

fn query_to_json(
    project_id: &str,
    query: &Query,
    transaction: Option<&TransactionId>,
    start: Option<&Cursor>,
    page_size: usize,
) -> wire::RunQueryRequest {
    let limit = query.limit.map_or(page_size, |l| l.min(page_size));
    wire::RunQueryRequest {
        partition_id: wire::PartitionId {
            project_id: project_id.to_string(),
            namespace_id: None,
        },
        read_options: transaction.map(|t| wire::ReadOptions {
            transaction: t.0.clone(),
        }),
        query: wire::QueryJson {
            kind: vec![wire::KindExpression {
                name: query.kind.clone(),
            }],
            offset: (query.offset > 0).then_some(query.offset),
            limit: Some(limit),
            start_cursor: start.map(|c| c.0.clone()),
            projection: query.keys_only.then(|| {
                vec![wire::Projection {
                    property: wire::PropertyReference {
                        name: "__key__".to_string(),
                    },
                }]
            }),
        },
    }
}

fn batch_from_json(batch: wire::QueryResultBatch) -> Result<QueryBatch> {
    let records = batch
        .entity_results
        .into_iter()
        .map(|r| entity_from_json(r.entity))
        .collect::<Result<Vec<_>>>()?;

    // AFTER_LIMIT refers to the page limit; the caller tracks its own limit
    let more_results = matches!(
        batch.more_results.as_str(),
        "NOT_FINISHED" | "MORE_RESULTS_AFTER_LIMIT"
    );

    Ok(QueryBatch {
        records,
        skipped: batch.skipped_results.unwrap_or(0),
        end_cursor: batch.end_cursor.map(Cursor),
        more_results,
    })
}

/// Map a non-success response to the closest error variant
fn error_from_response(status: u16, body: &str) -> StoreError {
    let parsed: Option<wire::ErrorResponse> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(r) => (r.error.status.unwrap_or_default(), r.error.message.unwrap_or_default()),
        None => (String::new(), body.to_string()),
    };

    match (status, code.as_str()) {
        (409, _) | (_, "ABORTED") => StoreError::Conflict(message),
        (400, _) | (_, "INVALID_ARGUMENT") => StoreError::InvalidArgument(message),
        (503, _) | (_, "UNAVAILABLE") => StoreError::Unavailable(message),
        _ => StoreError::Remote { status, message },
    }
}

mod wire {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    pub struct BeginTransactionRequest {}

    #[derive(Debug, Deserialize)]
    pub struct BeginTransactionResponse {
        pub transaction: String,
    }

    #[derive(Debug, Serialize)]
    pub struct CommitRequest {
        pub mode: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub transaction: Option<String>,
        pub mutations: Vec<MutationJson>,
    }

    #[derive(Debug, Serialize)]
    pub struct MutationJson {
        pub upsert: EntityJson,
    }

    #[derive(Debug, Serialize)]
    pub struct RollbackRequest {
        pub transaction: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PartitionId {
        pub project_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub namespace_id: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PathElement {
        pub kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct KeyJson {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub partition_id: Option<PartitionId>,
        pub path: Vec<PathElement>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ValueJson {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub null_value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub string_value: Option<String>,
        /// int64 travels as a JSON string
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub integer_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub boolean_value: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub key_value: Option<KeyJson>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityJson {
        pub key: KeyJson,
        #[serde(default)]
        pub properties: BTreeMap<String, ValueJson>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RunQueryRequest {
        pub partition_id: PartitionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub read_options: Option<ReadOptions>,
        pub query: QueryJson,
    }

    #[derive(Debug, Serialize)]
    pub struct ReadOptions {
        pub transaction: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct QueryJson {
        pub kind: Vec<KindExpression>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub offset: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub limit: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub start_cursor: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub projection: Option<Vec<Projection>>,
    }

    #[derive(Debug, Serialize)]
    pub struct KindExpression {
        pub name: String,
    }

    #[derive(Debug, Serialize)]
    pub struct Projection {
        pub property: PropertyReference,
    }

    #[derive(Debug, Serialize)]
    pub struct PropertyReference {
        pub name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct RunQueryResponse {
        pub batch: QueryResultBatch,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct QueryResultBatch {
        #[serde(default)]
        pub entity_results: Vec<EntityResult>,
        #[serde(default)]
        pub skipped_results: Option<usize>,
        #[serde(default)]
        pub end_cursor: Option<String>,
        #[serde(default)]
        pub more_results: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct EntityResult {
        pub entity: EntityJson,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorResponse {
        pub error: ErrorBody,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        pub message: Option<String>,
        pub status: Option<String>,
    }
}
