//! Postgres-backed document store.
//!
//! Documents live in the `documents` table as JSONB bodies keyed by
//! `(database_name, collection, id)`. Filters are translated to JSONB path
//! expressions; a document lacking the filtered field never matches.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::registry::StoreConnector;
use super::store::{Direction, Document, DocumentStore, Filter, FilterOp, Query, StoreError};

/// One partition of the `documents` table.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    database: String,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

fn parse_body(raw: &str) -> Result<Map<String, Value>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT data::text FROM documents \
             WHERE database_name = $1 AND collection = $2 AND id = $3",
        )
        .bind(&self.database)
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|raw| {
            Ok(Document {
                id: id.to_string(),
                data: parse_body(&raw)?,
            })
        })
        .transpose()
    }

    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        let body = serde_json::to_string(&data)?;
        sqlx::query(
            "INSERT INTO documents (database_name, collection, id, data) \
             VALUES ($1, $2, $3, $4::jsonb) \
             ON CONFLICT (database_name, collection, id) \
             DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(&self.database)
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE database_name = $1 AND collection = $2 AND id = $3")
            .bind(&self.database)
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let plan = build_select(query)?;

        let mut select = sqlx::query_as::<_, (String, String)>(&plan.sql)
            .bind(&self.database)
            .bind(collection);
        // Bind parameters in the same order they were added
        for param in plan.params {
            select = match param {
                Param::Path(path) => select.bind(path),
                Param::Json(json) => select.bind(json),
                Param::Int(n) => select.bind(n),
            };
        }

        let rows = select.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id, raw)| {
                Ok(Document {
                    id,
                    data: parse_body(&raw)?,
                })
            })
            .collect()
    }
}

/// Connects partitions of one shared pool.
#[derive(Debug, Clone)]
pub struct PgConnector {
    pool: PgPool,
}

impl PgConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    async fn connect(&self, database: &str) -> Result<Arc<dyn DocumentStore>, StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(Arc::new(PgDocumentStore::new(self.pool.clone(), database)))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Param {
    Path(Vec<String>),
    Json(String),
    Int(i64),
}

#[derive(Debug)]
struct SelectPlan {
    sql: String,
    params: Vec<Param>,
}

/// Translate a [`Query`] into SQL. `$1` and `$2` are partition and collection.
fn build_select(query: &Query) -> Result<SelectPlan, StoreError> {
    let mut params = Vec::new();
    let mut next_param = 3;
    let mut push = |param: Param| {
        params.push(param);
        let placeholder = format!("${next_param}");
        next_param += 1;
        placeholder
    };

    let mut conditions = vec![
        "database_name = $1".to_string(),
        "collection = $2".to_string(),
    ];

    for filter in &query.filters {
        let path = push(Param::Path(split_path(&filter.field)));
        let value = push(Param::Json(serde_json::to_string(&filter.value)?));
        conditions.push(filter_condition(filter, &path, &value));
    }

    let mut order_terms = Vec::new();
    for order in &query.order_by {
        let path = push(Param::Path(split_path(&order.field)));
        conditions.push(format!("data #> {path}::text[] IS NOT NULL"));
        let direction = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        order_terms.push(format!("data #> {path}::text[] {direction}"));
    }
    order_terms.push("id ASC".to_string());

    let mut sql = format!(
        "SELECT id, data::text FROM documents WHERE {} ORDER BY {}",
        conditions.join(" AND "),
        order_terms.join(", ")
    );

    if let Some(limit) = query.limit {
        let placeholder = push(Param::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT {placeholder}"));
    }
    if let Some(offset) = query.offset {
        let placeholder = push(Param::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" OFFSET {placeholder}"));
    }

    Ok(SelectPlan { sql, params })
}

fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn filter_condition(filter: &Filter, path: &str, value: &str) -> String {
    let field = format!("(data #> {path}::text[])");
    let value = format!("{value}::jsonb");
    let same_kind = format!("jsonb_typeof({field}) = jsonb_typeof({value})");
    match filter.op {
        FilterOp::Eq => format!("{field} = {value}"),
        FilterOp::Ne => format!("{field} <> {value}"),
        FilterOp::Lt => format!("({same_kind} AND {field} < {value})"),
        FilterOp::Le => format!("({same_kind} AND {field} <= {value})"),
        FilterOp::Gt => format!("({same_kind} AND {field} > {value})"),
        FilterOp::Ge => format!("({same_kind} AND {field} >= {value})"),
        FilterOp::In => format!(
            "EXISTS (SELECT 1 FROM jsonb_array_elements({value}) AS c(v) WHERE c.v = {field})"
        ),
        FilterOp::NotIn => format!(
            "({field} IS NOT NULL AND NOT EXISTS \
             (SELECT 1 FROM jsonb_array_elements({value}) AS c(v) WHERE c.v = {field}))"
        ),
        FilterOp::ArrayContains => format!(
            "(CASE WHEN jsonb_typeof({field}) = 'array' THEN EXISTS \
             (SELECT 1 FROM jsonb_array_elements({field}) AS e(v) WHERE e.v = {value}) \
             ELSE false END)"
        ),
        FilterOp::ArrayContainsAny => format!(
            "(CASE WHEN jsonb_typeof({field}) = 'array' THEN EXISTS \
             (SELECT 1 FROM jsonb_array_elements({field}) AS e(v) \
              JOIN jsonb_array_elements({value}) AS c(v) ON e.v = c.v) \
             ELSE false END)"
        ),
    }
}
