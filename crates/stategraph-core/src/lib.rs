use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Value: a single dynamically typed state field
// ---------------------------------------------------------------------------

/// A dynamically typed state field: integer, float, string, boolean or a
/// nested state.
///
/// Serializing a non-finite float (NaN or an infinity) fails, since it could
/// not be read back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(StateMap),
}

/// The kind of a [`Value`], used by [`Schema`] declarations and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as `f64`. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Map(m) => write!(f, "{m}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => ser.serialize_bool(*b),
            Value::Int(i) => ser.serialize_i64(*i),
            Value::Float(v) if v.is_finite() => ser.serialize_f64(*v),
            Value::Float(v) => Err(serde::ser::Error::custom(format!(
                "non-finite float {v} has no state representation"
            ))),
            Value::Str(s) => ser.serialize_str(s),
            Value::Map(m) => m.serialize(ser),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<StateMap> for Value {
    fn from(v: StateMap) -> Self {
        Value::Map(v)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = FieldError;

    /// Converts a JSON value. `null` and arrays have no state representation.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| FieldError::Other(format!("unrepresentable number {n}"))),
            },
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Object(obj) => {
                StateMap::try_from(serde_json::Value::Object(obj)).map(Value::Map)
            }
            serde_json::Value::Null => Err(FieldError::Other("null is not a state value".into())),
            serde_json::Value::Array(_) => {
                Err(FieldError::Other("arrays are not state values".into()))
            }
        }
    }
}

/// Lossy for non-finite floats, which become `null` as in `serde_json`.
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(v) => serde_json::Value::from(v),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Map(m) => m.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateMap: ordered mapping of field name to value
// ---------------------------------------------------------------------------

/// An ordered mapping from field name to [`Value`].
///
/// Fields iterate in name order. A `StateMap` doubles as a partial update:
/// [`merge`](Self::merge) overwrites every field present in the update and
/// leaves all other fields untouched. Nested maps are replaced whole, never
/// deep-merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap {
    fields: BTreeMap<String, Value>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert a field, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field-level overwrite with every field of `update`.
    pub fn merge(&mut self, update: StateMap) {
        self.fields.extend(update.fields);
    }

    /// Non-destructive merge: returns a new map, `self` is left as it was.
    pub fn merged(&self, update: &StateMap) -> StateMap {
        let mut next = self.clone();
        next.merge(update.clone());
        next
    }

    /// Look up a field that must be present.
    pub fn require(&self, field: &str) -> Result<&Value, FieldError> {
        self.get(field)
            .ok_or_else(|| FieldError::Missing(field.to_string()))
    }

    pub fn require_int(&self, field: &str) -> Result<i64, FieldError> {
        let value = self.require(field)?;
        value
            .as_int()
            .ok_or_else(|| FieldError::wrong_kind(field, ValueKind::Int, value))
    }

    pub fn require_float(&self, field: &str) -> Result<f64, FieldError> {
        let value = self.require(field)?;
        value
            .as_float()
            .ok_or_else(|| FieldError::wrong_kind(field, ValueKind::Float, value))
    }

    pub fn require_str(&self, field: &str) -> Result<&str, FieldError> {
        let value = self.require(field)?;
        value
            .as_str()
            .ok_or_else(|| FieldError::wrong_kind(field, ValueKind::Str, value))
    }

    pub fn require_bool(&self, field: &str) -> Result<bool, FieldError> {
        let value = self.require(field)?;
        value
            .as_bool()
            .ok_or_else(|| FieldError::wrong_kind(field, ValueKind::Bool, value))
    }

    pub fn require_map(&self, field: &str) -> Result<&StateMap, FieldError> {
        let value = self.require(field)?;
        value
            .as_map()
            .ok_or_else(|| FieldError::wrong_kind(field, ValueKind::Map, value))
    }
}

impl fmt::Display for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for StateMap {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for StateMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.fields
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl IntoIterator for StateMap {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl TryFrom<serde_json::Value> for StateMap {
    type Error = FieldError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let serde_json::Value::Object(obj) = value else {
            return Err(FieldError::Other("state must be a JSON object".into()));
        };
        let mut map = StateMap::new();
        for (field, raw) in obj {
            let value = Value::try_from(raw).map_err(|e| match e {
                FieldError::Other(reason) => FieldError::Invalid {
                    field: field.clone(),
                    reason,
                },
                other => other,
            })?;
            map.insert(field, value);
        }
        Ok(map)
    }
}

impl From<StateMap> for serde_json::Value {
    fn from(map: StateMap) -> Self {
        serde_json::Value::Object(
            map.fields
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::from(v)))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Schema: optional declared field set for StateMap graphs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpec {
    kind: ValueKind,
    required: bool,
}

/// Declared fields and kinds for a [`StateMap`] graph.
///
/// Required fields must be present in the initial state. Since merges never
/// drop fields, they stay present for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional field.
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: false,
            },
        );
        self
    }

    /// Declare a field that must be present in every state.
    pub fn required(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: true,
            },
        );
        self
    }

    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.fields.get(name).map(|spec| spec.kind)
    }

    pub fn validate(&self, state: &StateMap) -> Result<(), FieldError> {
        for (name, value) in state.iter() {
            let spec = self
                .fields
                .get(name)
                .ok_or_else(|| FieldError::Undeclared(name.to_string()))?;
            // Ints satisfy float fields; the reverse does not hold.
            let compatible = value.kind() == spec.kind
                || (spec.kind == ValueKind::Float && value.kind() == ValueKind::Int);
            if !compatible {
                return Err(FieldError::wrong_kind(name, spec.kind, value));
            }
        }
        for (name, spec) in &self.fields {
            if spec.required && !state.contains(name) {
                return Err(FieldError::Missing(name.clone()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExecutionTrace
// ---------------------------------------------------------------------------

/// Ordered node ids visited during one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    run_id: String,
    visited: Vec<String>,
}

impl ExecutionTrace {
    /// Start an empty trace with a fresh run id.
    pub fn new() -> Self {
        Self::with_run_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            visited: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn push(&mut self, node: impl Into<String>) {
        self.visited.push(node.into());
    }

    pub fn last(&self) -> Option<&str> {
        self.visited.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Long cyclic traces are elided in the middle.
        const SHOWN: usize = 8;
        if self.visited.len() <= SHOWN * 2 {
            return f.write_str(&self.visited.join(" -> "));
        }
        let head = &self.visited[..SHOWN];
        let tail = &self.visited[self.visited.len() - SHOWN..];
        write!(
            f,
            "{} -> ... ({} more) ... -> {}",
            head.join(" -> "),
            self.visited.len() - SHOWN * 2,
            tail.join(" -> ")
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type returned by node transforms and routers.
pub type NodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A problem with a single state field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(String),
    #[error("field '{field}' expected {expected}, found {found}")]
    WrongKind {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("undeclared field '{0}'")]
    Undeclared(String),
    #[error("invalid field '{field}': {reason}")]
    Invalid { field: String, reason: String },
    #[error("{0}")]
    Other(String),
}

impl FieldError {
    fn wrong_kind(field: &str, expected: ValueKind, found: &Value) -> Self {
        FieldError::WrongKind {
            field: field.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

/// The role a node id plays where it was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Entry,
    Source,
    Target,
    BranchTarget,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Entry => "entry point",
            NodeRole::Source => "edge source",
            NodeRole::Target => "edge target",
            NodeRole::BranchTarget => "branch target",
        };
        f.write_str(name)
    }
}

/// Unified error type for building and running state graphs.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),
    #[error("invalid node id '{0}': ids must be non-empty and not reserved")]
    InvalidNodeId(String),
    #[error("{role} node '{id}' not found")]
    UnknownNode { id: String, role: NodeRole },
    #[error("no entry point set")]
    MissingEntryPoint,
    #[error("node '{0}' has more than one outgoing edge specification")]
    ConflictingEdge(String),
    #[error("unreachable nodes: {}", .0.join(", "))]
    UnreachableNode(Vec<String>),
    #[error("node '{node}' failed: {source}")]
    Execution {
        node: String,
        #[source]
        source: NodeError,
    },
    #[error("node '{node}' routed to unmapped branch '{key}'")]
    UnmappedBranch { node: String, key: String },
    #[error("max steps ({max_steps}) exceeded, possible infinite loop: {trace}")]
    StepLimitExceeded {
        max_steps: usize,
        trace: ExecutionTrace,
    },
    #[error("deadline of {}ms exceeded: {trace}", .deadline.as_millis())]
    DeadlineExceeded {
        deadline: Duration,
        trace: ExecutionTrace,
    },
    #[error("invalid initial state: {0}")]
    InvalidInput(#[source] FieldError),
    #[error("node '{node}' produced invalid state: {source}")]
    InvalidState {
        node: String,
        #[source]
        source: FieldError,
    },
}

impl GraphError {
    /// True for errors raised while building or compiling a graph.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateNode(_)
                | GraphError::InvalidNodeId(_)
                | GraphError::UnknownNode { .. }
                | GraphError::MissingEntryPoint
                | GraphError::ConflictingEdge(_)
                | GraphError::UnreachableNode(_)
        )
    }

    /// The node a run-time error is attributed to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            GraphError::Execution { node, .. }
            | GraphError::UnmappedBranch { node, .. }
            | GraphError::InvalidState { node, .. } => Some(node),
            GraphError::StepLimitExceeded { trace, .. }
            | GraphError::DeadlineExceeded { trace, .. } => trace.last(),
            _ => None,
        }
    }

    pub fn trace(&self) -> Option<&ExecutionTrace> {
        match self {
            GraphError::StepLimitExceeded { trace, .. }
            | GraphError::DeadlineExceeded { trace, .. } => Some(trace),
            _ => None,
        }
    }
}
