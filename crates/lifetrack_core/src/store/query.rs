//! `get_all` options.

use crate::model::record::Record;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

pub type RecordFilter = Box<dyn Fn(&Record) -> bool + Send + Sync>;
pub type RecordComparator = Box<dyn Fn(&Record, &Record) -> Ordering + Send + Sync>;

/// Narrowing and shaping of a `get_all` result.
///
/// Applied in fixed order: index scan, filter, sort, limit.
#[derive(Default)]
pub struct GetAllOptions {
    pub index: Option<String>,
    /// Index value to match; `None` returns every record with the field set.
    pub value: Option<Value>,
    pub filter: Option<RecordFilter>,
    pub sort: Option<RecordComparator>,
    pub limit: Option<usize>,
}

impl GetAllOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn index_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.index = Some(name.into());
        self.value = Some(value.into());
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn sort<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Record, &Record) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Box::new(compare));
        self
    }

    /// Sorts by a top-level field; records missing the field sort first.
    pub fn sort_by_field(self, field: &str, descending: bool) -> Self {
        let field = field.to_string();
        self.sort(move |left, right| {
            let ordering = compare_values(left.get(&field), right.get(&field));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(super) fn apply(&self, mut records: Vec<Record>) -> Vec<Record> {
        if let Some(filter) = &self.filter {
            records.retain(|record| filter(record));
        }
        if let Some(sort) = &self.sort {
            records.sort_by(|left, right| sort(left, right));
        }
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        records
    }
}

impl Debug for GetAllOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetAllOptions")
            .field("index", &self.index)
            .field("value", &self.value)
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

/// Orders scalar JSON values: absent/null < bool < number < string.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_values, GetAllOptions};
    use crate::model::record::Record;
    use serde_json::json;
    use std::cmp::Ordering;

    fn records(values: &[i64]) -> Vec<Record> {
        values
            .iter()
            .map(|value| json!({ "n": value }).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn applies_filter_then_sort_then_limit() {
        let options = GetAllOptions::new()
            .filter(|record| record["n"].as_i64().unwrap_or(0) % 2 == 0)
            .sort_by_field("n", true)
            .limit(2);
        let result = options.apply(records(&[4, 1, 8, 2, 6, 3]));
        let values: Vec<i64> = result.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![8, 6]);
    }

    #[test]
    fn missing_fields_sort_first() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("a")), Some(&json!(2))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(2.5)), Some(&json!(2))), Ordering::Greater);
    }
}
