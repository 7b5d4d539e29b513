//! Projects backend replies into suggestion lists.
//!
//! Every resource has a known reply shape. Anything that does not fit the
//! shape (missing key, wrong type, record without id) is skipped.

use athenaviz_core::{ExecutionRecord, SuggestionItem};
use serde_json::Value;

/// How a resource's reply array is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Array of strings.
    NameList,
    /// Array of [`ExecutionRecord`] objects.
    ExecutionRecords,
}

pub static RESOURCE_SHAPES: &[(&str, ReplyShape)] = &[
    ("regions", ReplyShape::NameList),
    ("workgroup_names", ReplyShape::NameList),
    ("named_query_names", ReplyShape::NameList),
    ("named_query_queries", ReplyShape::NameList),
    ("query_execution_ids", ReplyShape::NameList),
    ("query_executions", ReplyShape::ExecutionRecords),
    ("query_executions_by_name", ReplyShape::ExecutionRecords),
];

pub fn shape_of(resource: &str) -> Option<ReplyShape> {
    RESOURCE_SHAPES
        .iter()
        .find(|(name, _)| *name == resource)
        .map(|(_, shape)| *shape)
}

/// Project a reply into `(text, value)` pairs. Execution records use their
/// id as both text and value.
pub fn project(resource: &str, reply: &Value) -> Vec<SuggestionItem> {
    project_with(resource, reply, |_, id| id.to_string())
}

/// Like [`project`], but execution records are labeled
/// `"<completion time> <id> <query>"` for interactive pickers.
pub fn project_labeled(resource: &str, reply: &Value) -> Vec<SuggestionItem> {
    project_with(resource, reply, execution_label)
}

fn project_with(
    resource: &str,
    reply: &Value,
    label: impl Fn(&ExecutionRecord, &str) -> String,
) -> Vec<SuggestionItem> {
    let Some(shape) = shape_of(resource) else {
        return Vec::new();
    };
    let Some(elements) = reply.get(resource).and_then(Value::as_array) else {
        return Vec::new();
    };

    match shape {
        ReplyShape::NameList => elements
            .iter()
            .filter_map(Value::as_str)
            .map(SuggestionItem::same)
            .collect(),
        ReplyShape::ExecutionRecords => elements
            .iter()
            .filter_map(|element| {
                let record: ExecutionRecord = serde_json::from_value(element.clone()).ok()?;
                let id = record.query_execution_id.as_deref()?;
                Some(SuggestionItem::new(label(&record, id), id))
            })
            .collect(),
    }
}

fn execution_label(record: &ExecutionRecord, id: &str) -> String {
    let completed = record
        .completed_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let query = record.query.as_deref().unwrap_or_default();
    format!("{completed} {id} {query}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pairs(items: &[SuggestionItem]) -> Vec<(&str, &str)> {
        items
            .iter()
            .map(|i| (i.text.as_str(), i.value.as_str()))
            .collect()
    }

    #[test]
    fn name_lists_map_to_identical_pairs() {
        let reply = json!({"named_query_names": ["daily", "hourly"]});
        let items = project("named_query_names", &reply);
        assert_eq!(pairs(&items), [("daily", "daily"), ("hourly", "hourly")]);
    }

    #[test]
    fn execution_records_use_id_as_value() {
        let reply = json!({"query_executions_by_name": [
            {
                "QueryExecutionId": "e1",
                "Query": "SELECT 1",
                "Status": {"State": "SUCCEEDED", "CompletionDateTime": "2024-05-01T10:00:00Z"}
            },
            {"QueryExecutionId": "e2"}
        ]});
        let plain = project("query_executions_by_name", &reply);
        assert_eq!(pairs(&plain), [("e1", "e1"), ("e2", "e2")]);

        let labeled = project_labeled("query_executions_by_name", &reply);
        assert_eq!(labeled[0].text, "2024-05-01 10:00:00 e1 SELECT 1");
        assert_eq!(labeled[0].value, "e1");
        assert_eq!(labeled[1].text, "e2");
    }

    #[test]
    fn malformed_replies_degrade_to_empty_or_skip() {
        assert!(project("regions", &json!({})).is_empty());
        assert!(project("regions", &json!({"regions": "us-east-1"})).is_empty());
        assert!(project("something_else", &json!({"something_else": ["a"]})).is_empty());
        assert!(project("regions", &json!(null)).is_empty());

        let reply = json!({"regions": ["us-east-1", 7, null, "eu-west-1"]});
        assert_eq!(
            pairs(&project("regions", &reply)),
            [("us-east-1", "us-east-1"), ("eu-west-1", "eu-west-1")]
        );

        let reply = json!({"query_executions": [{"Query": "no id"}, "junk", {"QueryExecutionId": "e3"}]});
        assert_eq!(pairs(&project("query_executions", &reply)), [("e3", "e3")]);
    }

    #[test]
    fn projection_is_repeatable() {
        let reply = json!({"query_execution_ids": ["b", "a", "c"]});
        let first = project("query_execution_ids", &reply);
        let second = project("query_execution_ids", &reply);
        assert_eq!(first, second);
        assert_eq!(pairs(&first), [("b", "b"), ("a", "a"), ("c", "c")]);
    }

    #[test]
    fn every_dispatched_resource_has_a_shape() {
        for spec in crate::forms::FORMS {
            assert!(shape_of(spec.resource).is_some(), "{}", spec.resource);
        }
    }
}
