//! In-memory stand-in for the remote service, plus temp path helpers

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{DataApiError, Result};
use crate::executor::{Command, CommandExecutor, CommandOptions, Document, RawResponse};

/// Create a unique temp file path with the given stem and extension in the OS temp dir.
pub fn temp_path(stem: &str, ext: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("{}_{}_{}.{}", stem, now, Uuid::new_v4().simple(), ext));
    p
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    calls: HashMap<&'static str, usize>,
    last_commands: HashMap<&'static str, Value>,
    // (command name, 1-based call number) pairs that answer with a 503
    failures: Vec<(&'static str, usize)>,
}

/// Executor answering commands from in-process collections
///
/// Filters only support top-level equality, updates only `$set`. Calls are
/// counted when they start, mutations are applied after the configured
/// latency so a timed-out call leaves the data untouched.
pub struct InMemoryExecutor {
    state: Mutex<State>,
    page_size: usize,
    count_limit: u64,
    honor_limit: bool,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 20,
            count_limit: 1000,
            honor_limit: true,
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_count_limit(mut self, limit: u64) -> Self {
        self.count_limit = limit;
        self
    }

    /// Page `find` results without applying the requested limit
    pub fn ignoring_limit(mut self) -> Self {
        self.honor_limit = false;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append documents to a collection
    pub fn seed(&self, namespace: &str, documents: impl IntoIterator<Item = Document>) {
        let mut state = self.state.lock().unwrap();
        state
            .collections
            .entry(namespace.to_string())
            .or_default()
            .extend(documents);
    }

    pub fn count(&self, namespace: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.collections.get(namespace).map_or(0, Vec::len)
    }

    pub fn find_by_id(&self, namespace: &str, id: &Value) -> Option<Document> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(namespace)?
            .iter()
            .find(|doc| doc.get("_id") == Some(id))
            .cloned()
    }

    pub fn calls(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Wire form of the most recent command with this name
    pub fn last_command(&self, name: &str) -> Option<Value> {
        self.state.lock().unwrap().last_commands.get(name).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Make the next call of `name` fail with an HTTP 503
    pub fn fail_next(&self, name: &'static str) {
        let next = self.calls(name) + 1;
        self.fail_call(name, next);
    }

    /// Make the `nth` call (1-based, counted since creation) of `name` fail with an HTTP 503
    pub fn fail_call(&self, name: &'static str, nth: usize) {
        self.state.lock().unwrap().failures.push((name, nth));
    }

    fn begin(&self, command: &Command) -> bool {
        let mut state = self.state.lock().unwrap();
        let name = command.name();
        let call = {
            let counter = state.calls.entry(name).or_insert(0);
            *counter += 1;
            *counter
        };
        state.last_commands.insert(name, command.to_json());

        let before = state.failures.len();
        state
            .failures
            .retain(|(failing, nth)| !(*failing == name && *nth == call));
        state.failures.len() != before
    }

    fn apply(&self, namespace: &str, command: &Command) -> Result<RawResponse> {
        let mut state = self.state.lock().unwrap();
        let docs = state.collections.entry(namespace.to_string()).or_default();

        let response = match command {
            Command::Find {
                filter,
                limit,
                skip,
                page_state,
                ..
            } => {
                let mut matched: Vec<Document> = docs
                    .iter()
                    .filter(|doc| matches_filter(doc, filter))
                    .skip(skip.unwrap_or(0) as usize)
                    .cloned()
                    .collect();
                if let Some(limit) = limit
                    && self.honor_limit
                {
                    matched.truncate(*limit as usize);
                }

                let offset: usize = match page_state {
                    Some(marker) => marker.parse().map_err(|_| {
                        DataApiError::Transport(format!("bad page state '{marker}'"))
                    })?,
                    None => 0,
                };
                let end = (offset + self.page_size).min(matched.len());
                let page: Vec<Document> = matched
                    .get(offset..end)
                    .map(<[Document]>::to_vec)
                    .unwrap_or_default();

                let mut data = json!({ "documents": page });
                if end < matched.len() {
                    data["nextPageState"] = json!(end.to_string());
                }
                json!({ "data": data })
            }

            Command::FindOne { filter, .. } => {
                match docs.iter().find(|doc| matches_filter(doc, filter)) {
                    Some(doc) => json!({ "data": { "document": doc } }),
                    None => json!({ "data": {} }),
                }
            }

            Command::CountDocuments { filter } => {
                let count = docs.iter().filter(|doc| matches_filter(doc, filter)).count() as u64;
                if count > self.count_limit {
                    json!({ "status": { "count": self.count_limit, "moreData": true } })
                } else {
                    json!({ "status": { "count": count } })
                }
            }

            Command::EstimatedDocumentCount => json!({ "status": { "count": docs.len() } }),

            Command::InsertOne { document } => match insert(docs, document.clone()) {
                Ok(id) => json!({ "status": { "insertedIds": [id] } }),
                Err(id) => json!({ "errors": [duplicate_error(&id)] }),
            },

            Command::InsertMany { documents, ordered } => {
                let mut inserted = Vec::new();
                let mut errors = Vec::new();
                for document in documents {
                    match insert(docs, document.clone()) {
                        Ok(id) => inserted.push(id),
                        Err(id) => {
                            errors.push(duplicate_error(&id));
                            if *ordered {
                                break;
                            }
                        }
                    }
                }
                let mut response = json!({ "status": { "insertedIds": inserted } });
                if !errors.is_empty() {
                    response["errors"] = Value::Array(errors);
                }
                response
            }

            Command::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                let (matched, modified, _) = update_from(docs, filter, update, 0, 1);
                let mut status = json!({ "matchedCount": matched, "modifiedCount": modified });
                if matched == 0 && *upsert {
                    status["upsertedId"] = upsert_from(docs, filter, update);
                }
                json!({ "status": status })
            }

            Command::UpdateMany {
                filter,
                update,
                upsert,
                page_state,
            } => {
                let start: usize = page_state
                    .as_deref()
                    .and_then(|marker| marker.parse().ok())
                    .unwrap_or(0);
                let (matched, modified, next) =
                    update_from(docs, filter, update, start, self.page_size);
                let mut status = json!({ "matchedCount": matched, "modifiedCount": modified });
                if let Some(next) = next {
                    status["moreData"] = json!(true);
                    status["nextPageState"] = json!(next.to_string());
                } else if matched == 0 && start == 0 && *upsert {
                    status["upsertedId"] = upsert_from(docs, filter, update);
                }
                json!({ "status": status })
            }

            Command::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => match docs.iter_mut().find(|doc| matches_filter(doc, filter)) {
                Some(doc) => {
                    let before = doc.clone();
                    let mut replaced = replacement.clone();
                    if let Some(id) = before.get("_id") {
                        replaced.insert("_id".to_string(), id.clone());
                    }
                    let modified = u64::from(replaced != before);
                    *doc = replaced;
                    json!({
                        "data": { "document": before },
                        "status": { "matchedCount": 1, "modifiedCount": modified }
                    })
                }
                None if *upsert => {
                    let mut created = replacement.clone();
                    let id = filter
                        .get("_id")
                        .cloned()
                        .unwrap_or_else(|| json!(Uuid::new_v4().to_string()));
                    created.insert("_id".to_string(), id.clone());
                    docs.push(created);
                    json!({
                        "data": { "document": null },
                        "status": { "matchedCount": 0, "modifiedCount": 0, "upsertedId": id }
                    })
                }
                None => json!({
                    "data": { "document": null },
                    "status": { "matchedCount": 0, "modifiedCount": 0 }
                }),
            },

            Command::DeleteOne { filter } => {
                match docs.iter().position(|doc| matches_filter(doc, filter)) {
                    Some(position) => {
                        docs.remove(position);
                        json!({ "status": { "deletedCount": 1 } })
                    }
                    None => json!({ "status": { "deletedCount": 0 } }),
                }
            }

            Command::DeleteMany { filter } if filter.is_empty() => {
                docs.clear();
                json!({ "status": { "deletedCount": -1 } })
            }

            Command::DeleteMany { filter } => {
                let mut deleted = 0usize;
                docs.retain(|doc| {
                    if deleted < self.page_size && matches_filter(doc, filter) {
                        deleted += 1;
                        false
                    } else {
                        true
                    }
                });
                let remaining = docs.iter().any(|doc| matches_filter(doc, filter));
                let mut status = json!({ "deletedCount": deleted });
                if remaining {
                    status["moreData"] = json!(true);
                }
                json!({ "status": status })
            }
        };

        Ok(RawResponse::from_json(response)?)
    }
}

#[async_trait]
impl CommandExecutor for InMemoryExecutor {
    async fn execute(
        &self,
        namespace: &str,
        command: &Command,
        _options: &CommandOptions,
    ) -> Result<RawResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let fail = self.begin(command);

        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        if fail {
            return Err(DataApiError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        self.apply(namespace, command)
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| doc.get(key) == Some(expected))
}

// Ok(id) on insert, Err(id) when the id is already taken
fn insert(docs: &mut Vec<Document>, mut document: Document) -> std::result::Result<Value, Value> {
    let id = document
        .entry("_id")
        .or_insert_with(|| json!(Uuid::new_v4().to_string()))
        .clone();
    if docs.iter().any(|doc| doc.get("_id") == Some(&id)) {
        return Err(id);
    }
    docs.push(document);
    Ok(id)
}

fn duplicate_error(id: &Value) -> Value {
    json!({
        "errorCode": "DOCUMENT_ALREADY_EXISTS",
        "message": format!("Document already exists with the given _id: {id}"),
        "family": "REQUEST"
    })
}

fn apply_set(doc: &mut Document, update: &Document) -> bool {
    let Some(Value::Object(fields)) = update.get("$set") else {
        return false;
    };
    let mut changed = false;
    for (key, value) in fields {
        if doc.get(key) != Some(value) {
            doc.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

// Updates at most `max` matches scanning from position `start`. Returns the
// counters and, when further matches remain, the position to resume from.
fn update_from(
    docs: &mut [Document],
    filter: &Document,
    update: &Document,
    start: usize,
    max: usize,
) -> (u64, u64, Option<usize>) {
    let (mut matched, mut modified) = (0u64, 0u64);
    let mut position = start;

    while position < docs.len() && (matched as usize) < max {
        if matches_filter(&docs[position], filter) {
            matched += 1;
            if apply_set(&mut docs[position], update) {
                modified += 1;
            }
        }
        position += 1;
    }

    let more = max > 1
        && docs
            .get(position..)
            .is_some_and(|rest| rest.iter().any(|doc| matches_filter(doc, filter)));
    (matched, modified, more.then_some(position))
}

fn upsert_from(docs: &mut Vec<Document>, filter: &Document, update: &Document) -> Value {
    let mut created = filter.clone();
    apply_set(&mut created, update);
    let id = created
        .entry("_id")
        .or_insert_with(|| json!(Uuid::new_v4().to_string()))
        .clone();
    docs.push(created);
    id
}
