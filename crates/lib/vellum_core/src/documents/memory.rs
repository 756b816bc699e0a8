//! In-process document store.
//!
//! Used by tests and by the server's `memory` backend. Query semantics match
//! the Postgres backend: a document lacking a filtered or ordered field never
//! matches, and values of different JSON kinds never compare as ordered.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::registry::StoreConnector;
use super::store::{Direction, Document, DocumentStore, Filter, FilterOp, Query, StoreError};

type CollectionKey = (String, String);

/// A [`DocumentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<CollectionKey, Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let key = (collection.to_string(), id.to_string());
        Ok(self.documents.get(&key).map(|entry| Document {
            id: id.to_string(),
            data: entry.value().clone(),
        }))
    }

    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        self.documents
            .insert((collection.to_string(), id.to_string()), data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.documents
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut matched: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| query.filters.iter().all(|f| matches_filter(entry.value(), f)))
            .filter(|entry| {
                query
                    .order_by
                    .iter()
                    .all(|o| lookup(entry.value(), &o.field).is_some())
            })
            .map(|entry| Document {
                id: entry.key().1.clone(),
                data: entry.value().clone(),
            })
            .collect();

        matched.sort_by(|a, b| {
            for order in &query.order_by {
                let ordering = match (lookup(&a.data, &order.field), lookup(&b.data, &order.field)) {
                    (Some(x), Some(y)) => total_cmp(x, y),
                    _ => Ordering::Equal,
                };
                let ordering = match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.id.cmp(&b.id)
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}

/// Hands out one shared [`MemoryStore`] per partition.
#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    partitions: Arc<DashMap<String, Arc<MemoryStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, database: &str) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let store = self
            .partitions
            .entry(database.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone();
        Ok(store)
    }
}

fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn matches_filter(data: &Map<String, Value>, filter: &Filter) -> bool {
    let Some(actual) = lookup(data, &filter.field) else {
        return false;
    };
    let expected = &filter.value;
    match filter.op {
        FilterOp::Eq => json_eq(actual, expected),
        FilterOp::Ne => !json_eq(actual, expected),
        FilterOp::Lt => ordered_cmp(actual, expected) == Some(Ordering::Less),
        FilterOp::Le => matches!(
            ordered_cmp(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOp::Gt => ordered_cmp(actual, expected) == Some(Ordering::Greater),
        FilterOp::Ge => matches!(
            ordered_cmp(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOp::In => candidates(expected).any(|c| json_eq(actual, c)),
        FilterOp::NotIn => !candidates(expected).any(|c| json_eq(actual, c)),
        FilterOp::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| json_eq(item, expected))),
        FilterOp::ArrayContainsAny => actual.as_array().is_some_and(|items| {
            candidates(expected).any(|c| items.iter().any(|item| json_eq(item, c)))
        }),
    }
}

fn candidates(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Cross-kind order of Postgres `jsonb`:
/// Object > Array > Boolean > Number > String > Null.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Comparison for range filters; `None` when the kinds differ.
fn ordered_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if kind_rank(a) != kind_rank(b) {
        return None;
    }
    Some(total_cmp(a, b))
}

/// Total order used for sorting, following `jsonb`: by kind first, then
/// containers by size before their contents.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|(left, right)| total_cmp(left, right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        }),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()).then_with(|| {
            jsonb_key_order(x)
                .into_iter()
                .zip(jsonb_key_order(y))
                .map(|((k1, v1), (k2, v2))| key_cmp(k1, k2).then_with(|| total_cmp(v1, v2)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        }),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// jsonb stores object keys shortest first, then bytewise.
fn key_cmp(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn jsonb_key_order(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut pairs: Vec<_> = map.iter().collect();
    pairs.sort_by(|(a, _), (b, _)| key_cmp(a, b));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::store::OrderBy;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = [
            ("a", json!({"name": "Ada", "age": 36, "tags": ["math", "poetry"], "address": {"city": "London"}})),
            ("b", json!({"name": "Grace", "age": 45, "tags": ["navy"], "address": {"city": "New York"}})),
            ("c", json!({"name": "Alan", "age": 41, "tags": ["math"]})),
            ("d", json!({"name": "Edsger"})),
        ];
        for (id, data) in rows {
            store.set("people", id, doc(data)).await.unwrap();
        }
        store.set("other", "x", doc(json!({"name": "Ada"}))).await.unwrap();
        store
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn get_set_delete() {
        let store = MemoryStore::new();
        assert!(store.get("c", "1").await.unwrap().is_none());

        store.set("c", "1", doc(json!({"v": 1}))).await.unwrap();
        store.set("c", "1", doc(json!({"v": 2}))).await.unwrap();
        let fetched = store.get("c", "1").await.unwrap().unwrap();
        assert_eq!(fetched.data["v"], json!(2));

        store.delete("c", "1").await.unwrap();
        store.delete("c", "1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn range_filters_skip_missing_fields() {
        let store = seeded().await;
        let query = Query {
            filters: vec![Filter::new("age", FilterOp::Gt, 40)],
            order_by: vec![OrderBy::parse("age")],
            ..Query::default()
        };
        let found = store.query("people", &query).await.unwrap();
        assert_eq!(ids(&found), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn nested_equality() {
        let store = seeded().await;
        let query = Query {
            filters: vec![Filter::new("address.city", FilterOp::Eq, "London")],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &query).await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn membership_and_containment() {
        let store = seeded().await;

        let within = Query {
            filters: vec![Filter::new("name", FilterOp::In, json!(["Ada", "Alan"]))],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &within).await.unwrap()), vec!["a", "c"]);

        let outside = Query {
            filters: vec![Filter::new("name", FilterOp::NotIn, json!(["Ada", "Alan"]))],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &outside).await.unwrap()), vec!["b", "d"]);

        let contains = Query {
            filters: vec![Filter::new("tags", FilterOp::ArrayContains, "math")],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &contains).await.unwrap()), vec!["a", "c"]);

        let any = Query {
            filters: vec![Filter::new(
                "tags",
                FilterOp::ArrayContainsAny,
                json!(["navy", "poetry"]),
            )],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &any).await.unwrap()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn ordering_offset_and_limit() {
        let store = seeded().await;
        let query = Query {
            order_by: vec![OrderBy::parse("-age")],
            offset: Some(1),
            limit: Some(1),
            ..Query::default()
        };
        assert_eq!(ids(&store.query("people", &query).await.unwrap()), vec!["c"]);
    }

    #[tokio::test]
    async fn mixed_kinds_do_not_range_compare() {
        let store = MemoryStore::new();
        store.set("c", "n", doc(json!({"v": 10}))).await.unwrap();
        store.set("c", "s", doc(json!({"v": "10"}))).await.unwrap();
        let query = Query {
            filters: vec![Filter::new("v", FilterOp::Ge, 5)],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("c", &query).await.unwrap()), vec!["n"]);
    }

    #[tokio::test]
    async fn connector_reuses_partition_store() {
        let connector = MemoryConnector::new();
        let first = connector.connect("tenant").await.unwrap();
        first.set("c", "1", doc(json!({}))).await.unwrap();
        let second = connector.connect("tenant").await.unwrap();
        assert!(second.get("c", "1").await.unwrap().is_some());
        let other = connector.connect("elsewhere").await.unwrap();
        assert!(other.get("c", "1").await.unwrap().is_none());
    }

    #[test]
    fn cross_kind_order_matches_jsonb() {
        let ascending = [
            json!(null),
            json!("zzz"),
            json!(-5),
            json!(100),
            json!(false),
            json!(true),
            json!([9, 9]),
            json!([1, 1, 1]),
            json!({"b": 1}),
            json!({"a": 1, "b": 2}),
        ];
        for pair in ascending.windows(2) {
            assert_eq!(total_cmp(&pair[0], &pair[1]), Ordering::Less, "{} < {}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn mixed_kinds_sort_like_postgres() {
        let store = MemoryStore::new();
        for (id, value) in [("s", json!("text")), ("n", json!(3)), ("b", json!(true)), ("o", json!({"k": 1}))] {
            store.set("mixed", id, doc(json!({ "v": value }))).await.unwrap();
        }
        let query = Query {
            order_by: vec![OrderBy::parse("v")],
            ..Query::default()
        };
        assert_eq!(ids(&store.query("mixed", &query).await.unwrap()), vec!["s", "n", "b", "o"]);
    }
}
