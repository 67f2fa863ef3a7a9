//! Decoded record: per-call snapshot of one block's field values.
//!
//! A record owns no reference to the source buffer. Field-level decode
//! problems (unknown enum code, buffer too short for one field) are carried
//! as issues next to the values, so one bad field never blocks inspection of
//! the rest of the block.

use std::collections::BTreeMap;

use crate::codec::CodecError;
use crate::value::Value;

/// A decode problem scoped to one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub field: String,
    pub error: CodecError,
}

/// Field name → value mapping, name-ordered, plus accumulated field issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRecord {
    fields: BTreeMap<String, Value>,
    issues: Vec<FieldIssue>,
}

impl DecodedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Issues for this record only (not nested sub-records).
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn push_issue(&mut self, field: impl Into<String>, error: CodecError) {
        self.issues.push(FieldIssue { field: field.into(), error });
    }

    /// True when this record and every nested sub-record decoded without
    /// field issues.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
            && self.fields.values().all(|v| match v {
                Value::Record(sub) => sub.is_clean(),
                _ => true,
            })
    }

    /// All issues, including nested sub-records, with dotted field paths
    /// ("mods0.dest").
    pub fn all_issues(&self) -> Vec<FieldIssue> {
        let mut out = Vec::new();
        self.collect_issues("", &mut out);
        out
    }

    fn collect_issues(&self, prefix: &str, out: &mut Vec<FieldIssue>) {
        for issue in &self.issues {
            out.push(FieldIssue {
                field: join_path(prefix, &issue.field),
                error: issue.error.clone(),
            });
        }
        for (name, value) in &self.fields {
            if let Value::Record(sub) = value {
                sub.collect_issues(&join_path(prefix, name), out);
            }
        }
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
