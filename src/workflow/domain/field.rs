//! Field identifiers and change lists recorded in issue activities.

use super::{IssueStatus, PrincipalId, TaskId, TaskStatus, WorkflowDomainError};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

const TASK_FIELD_PREFIX: &str = "TASK.";

/// Built-in issue fields tracked in change lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueField {
    /// Issue assignee.
    Assignee,
    /// Free-text description.
    Description,
    /// Issue status.
    Status,
    /// Subscriber principals.
    SubscriberList,
    /// Forward SQL statement.
    Sql,
    /// Rollback SQL statement.
    RollbackSql,
}

impl IssueField {
    const ALL: [Self; 6] = [
        Self::Assignee,
        Self::Description,
        Self::Status,
        Self::SubscriberList,
        Self::Sql,
        Self::RollbackSql,
    ];

    /// Returns the well-known field identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assignee => "ASSIGNEE",
            Self::Description => "DESCRIPTION",
            Self::Status => "STATUS",
            Self::SubscriberList => "SUBSCRIBER_LIST",
            Self::Sql => "SQL",
            Self::RollbackSql => "ROLLBACK_SQL",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }
}

/// Key of an extra issue payload field.
///
/// Keys are ASCII alphanumerics, `_` or `-`, and never collide with a
/// built-in field identifier, so every [`FieldId`] renders unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadKey(String);

impl PayloadKey {
    /// Creates a validated payload key.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::UnknownPayloadField`] when the key is
    /// empty, contains characters outside `[A-Za-z0-9_-]`, or shadows a
    /// built-in field.
    pub fn new(value: impl Into<String>) -> Result<Self, WorkflowDomainError> {
        let raw = value.into();
        let is_valid = !raw.is_empty()
            && raw
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
            && IssueField::parse(&raw).is_none()
            && raw != "TASK";
        if !is_valid {
            return Err(WorkflowDomainError::UnknownPayloadField(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PayloadKey {
    type Error = WorkflowDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PayloadKey> for String {
    fn from(key: PayloadKey) -> Self {
        key.0
    }
}

impl fmt::Display for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a changed field inside an activity change list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldId {
    /// A built-in issue field.
    Builtin(IssueField),
    /// The status of one pipeline task, rendered as `TASK.<taskId>`.
    Task(TaskId),
    /// An extra payload field, rendered as the key itself.
    Payload(PayloadKey),
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(field) => f.write_str(field.as_str()),
            Self::Task(task_id) => write!(f, "{TASK_FIELD_PREFIX}{task_id}"),
            Self::Payload(key) => f.write_str(key.as_str()),
        }
    }
}

impl TryFrom<&str> for FieldId {
    type Error = WorkflowDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if let Some(field) = IssueField::parse(value) {
            return Ok(Self::Builtin(field));
        }
        if let Some(raw_task_id) = value.strip_prefix(TASK_FIELD_PREFIX) {
            let uuid = Uuid::parse_str(raw_task_id)
                .map_err(|_| WorkflowDomainError::InvalidFieldId(value.to_owned()))?;
            return Ok(Self::Task(TaskId::from_uuid(uuid)));
        }
        PayloadKey::new(value)
            .map(Self::Payload)
            .map_err(|_| WorkflowDomainError::InvalidFieldId(value.to_owned()))
    }
}

impl TryFrom<String> for FieldId {
    type Error = WorkflowDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<FieldId> for String {
    fn from(field_id: FieldId) -> Self {
        field_id.to_string()
    }
}

/// Conversion of a field value into its change-list JSON representation.
pub trait IntoFieldValue {
    /// Returns the JSON value recorded in the change list.
    fn into_field_value(self) -> Value;
}

impl IntoFieldValue for String {
    fn into_field_value(self) -> Value {
        Value::String(self)
    }
}

impl<T: IntoFieldValue> IntoFieldValue for Option<T> {
    fn into_field_value(self) -> Value {
        self.map_or(Value::Null, IntoFieldValue::into_field_value)
    }
}

impl IntoFieldValue for PrincipalId {
    fn into_field_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoFieldValue for Vec<PrincipalId> {
    fn into_field_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoFieldValue::into_field_value).collect())
    }
}

impl IntoFieldValue for IssueStatus {
    fn into_field_value(self) -> Value {
        Value::String(self.as_str().to_owned())
    }
}

impl IntoFieldValue for TaskStatus {
    fn into_field_value(self) -> Value {
        Value::String(self.as_str().to_owned())
    }
}

impl IntoFieldValue for Value {
    fn into_field_value(self) -> Value {
        self
    }
}

/// One field-level change recorded in an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// The changed field.
    pub field_id: FieldId,
    /// Value before the change.
    pub old_value: Value,
    /// Value after the change.
    pub new_value: Value,
}

/// Ordered list of field changes produced by one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeList(Vec<FieldChange>);

impl ChangeList {
    /// Creates an empty change list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Records a change when `old` and `new` differ.
    ///
    /// Returns whether an entry was appended.
    pub fn record<T>(&mut self, field_id: FieldId, old: T, new: T) -> bool
    where
        T: PartialEq + IntoFieldValue,
    {
        if old == new {
            return false;
        }
        self.0.push(FieldChange {
            field_id,
            old_value: old.into_field_value(),
            new_value: new.into_field_value(),
        });
        true
    }

    /// Returns whether no change was recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of recorded changes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the recorded changes.
    #[must_use]
    pub fn entries(&self) -> &[FieldChange] {
        &self.0
    }

    /// Finds the change recorded for `field_id`, if any.
    #[must_use]
    pub fn find(&self, field_id: &FieldId) -> Option<&FieldChange> {
        self.0.iter().find(|change| &change.field_id == field_id)
    }
}

/// Extra issue fields keyed by [`PayloadKey`].
///
/// A JSON `null` value is never stored; absent keys read as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuePayload(BTreeMap<PayloadKey, Value>);

impl IssuePayload {
    /// Creates an empty payload.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value stored under `key`, or `null`.
    #[must_use]
    pub fn get(&self, key: &PayloadKey) -> &Value {
        self.0.get(key).unwrap_or(&Value::Null)
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the payload has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates stored entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PayloadKey, &Value)> {
        self.0.iter()
    }

    /// Diffs `updates` against the stored values by deep equality and
    /// records one change per differing key.
    ///
    /// Numbers compare by value, so `3` and `3.0` are the same value.
    pub fn diff_into(&self, updates: &BTreeMap<PayloadKey, Value>, changes: &mut ChangeList) {
        for (key, new_value) in updates {
            let old_value = self.get(key);
            if !json_eq(old_value, new_value) {
                changes.0.push(FieldChange {
                    field_id: FieldId::Payload(key.clone()),
                    old_value: old_value.clone(),
                    new_value: new_value.clone(),
                });
            }
        }
    }

    /// Records and merges only the updates that differ from the stored
    /// values, leaving equal values in their stored form.
    pub fn apply_updates(
        &mut self,
        updates: BTreeMap<PayloadKey, Value>,
        changes: &mut ChangeList,
    ) {
        let changed: BTreeMap<PayloadKey, Value> = updates
            .into_iter()
            .filter(|(key, value)| !json_eq(self.get(key), value))
            .collect();
        self.diff_into(&changed, changes);
        self.merge(changed);
    }

    /// Merges `updates` into the payload; `null` removes a key.
    pub fn merge(&mut self, updates: BTreeMap<PayloadKey, Value>) {
        for (key, value) in updates {
            if value.is_null() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value);
            }
        }
    }
}

impl FromIterator<(PayloadKey, Value)> for IssuePayload {
    fn from_iter<I: IntoIterator<Item = (PayloadKey, Value)>>(iter: I) -> Self {
        let mut payload = Self::new();
        payload.merge(iter.into_iter().collect());
        payload
    }
}

/// Deep equality of JSON values with numbers compared by value.
fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left_number), Value::Number(right_number)) => {
            number_eq(left_number, right_number)
        }
        (Value::Array(left_items), Value::Array(right_items)) => {
            left_items.len() == right_items.len()
                && left_items
                    .iter()
                    .zip(right_items)
                    .all(|(left_item, right_item)| json_eq(left_item, right_item))
        }
        (Value::Object(left_map), Value::Object(right_map)) => {
            left_map.len() == right_map.len()
                && left_map.iter().all(|(key, left_item)| {
                    right_map
                        .get(key)
                        .is_some_and(|right_item| json_eq(left_item, right_item))
                })
        }
        _ => left == right,
    }
}

fn number_eq(left: &Number, right: &Number) -> bool {
    if let (Some(left_int), Some(right_int)) = (left.as_i64(), right.as_i64()) {
        return left_int == right_int;
    }
    if let (Some(left_int), Some(right_int)) = (left.as_u64(), right.as_u64()) {
        return left_int == right_int;
    }
    let (Some(left_float), Some(right_float)) = (left.as_f64(), right.as_f64()) else {
        return false;
    };
    left_float.partial_cmp(&right_float) == Some(Ordering::Equal)
}
