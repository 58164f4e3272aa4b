//! Locating identifiers in a data model schema.

use serde_json::Value;

/// One identifier found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    /// Structural key, e.g. `Column: Sales[Amount]`.
    pub key: String,
    /// JSON pointer to the identifier string.
    pub pointer: String,
    /// Identifier value as found.
    pub id: String,
}

/// Finds the identifiers of one entity kind.
pub trait IdentityStrategy {
    /// Entity kind label, used in logs and as the key prefix.
    fn kind(&self) -> &'static str;

    /// Every identifier of this kind in `schema`, in document order.
    fn locate(&self, schema: &Value) -> Vec<EntityIdentity>;
}

/// Built-in strategies: queries, tables, columns, measures, expressions.
pub fn default_strategies() -> Vec<Box<dyn IdentityStrategy>> {
    vec![
        Box::new(QueryStrategy),
        Box::new(TableStrategy),
        Box::new(TableMemberStrategy::COLUMNS),
        Box::new(TableMemberStrategy::MEASURES),
        Box::new(ExpressionStrategy),
    ]
}

fn tables(schema: &Value) -> impl Iterator<Item = (usize, &Value)> {
    schema
        .pointer("/model/tables")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}

fn name_of(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}

/// Queries are identified by the name of each table partition. Tables with
/// several partitions number the later ones `#1`, `#2`, ...
#[derive(Debug, Clone, Copy)]
pub struct QueryStrategy;

impl IdentityStrategy for QueryStrategy {
    fn kind(&self) -> &'static str {
        "Query"
    }

    fn locate(&self, schema: &Value) -> Vec<EntityIdentity> {
        let mut found = Vec::new();
        for (t, table) in tables(schema) {
            let Some(table_name) = name_of(table) else {
                continue;
            };
            let partitions = table
                .get("partitions")
                .and_then(Value::as_array)
                .into_iter()
                .flatten();
            for (p, partition) in partitions.enumerate() {
                let Some(id) = name_of(partition) else {
                    continue;
                };
                let key = if p == 0 {
                    format!("Query: {table_name}")
                } else {
                    format!("Query: {table_name}#{p}")
                };
                found.push(EntityIdentity {
                    key,
                    pointer: format!("/model/tables/{t}/partitions/{p}/name"),
                    id: id.to_string(),
                });
            }
        }
        found
    }
}

/// Tables are identified by their `lineageTag`.
#[derive(Debug, Clone, Copy)]
pub struct TableStrategy;

impl IdentityStrategy for TableStrategy {
    fn kind(&self) -> &'static str {
        "Table"
    }

    fn locate(&self, schema: &Value) -> Vec<EntityIdentity> {
        tables(schema)
            .filter_map(|(t, table)| {
                let name = name_of(table)?;
                let tag = table.get("lineageTag").and_then(Value::as_str)?;
                Some(EntityIdentity {
                    key: format!("Table: {name}"),
                    pointer: format!("/model/tables/{t}/lineageTag"),
                    id: tag.to_string(),
                })
            })
            .collect()
    }
}

/// Columns and measures, identified by `lineageTag` and keyed
/// `<Kind>: <table>[<name>]`.
#[derive(Debug, Clone, Copy)]
pub struct TableMemberStrategy {
    kind: &'static str,
    member: &'static str,
}

impl TableMemberStrategy {
    pub const COLUMNS: Self = Self {
        kind: "Column",
        member: "columns",
    };
    pub const MEASURES: Self = Self {
        kind: "Measure",
        member: "measures",
    };
}

impl IdentityStrategy for TableMemberStrategy {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn locate(&self, schema: &Value) -> Vec<EntityIdentity> {
        let mut found = Vec::new();
        for (t, table) in tables(schema) {
            let Some(table_name) = name_of(table) else {
                continue;
            };
            let members = table
                .get(self.member)
                .and_then(Value::as_array)
                .into_iter()
                .flatten();
            for (m, member) in members.enumerate() {
                let (Some(name), Some(tag)) = (
                    name_of(member),
                    member.get("lineageTag").and_then(Value::as_str),
                ) else {
                    continue;
                };
                found.push(EntityIdentity {
                    key: format!("{}: {table_name}[{name}]", self.kind),
                    pointer: format!("/model/tables/{t}/{}/{m}/lineageTag", self.member),
                    id: tag.to_string(),
                });
            }
        }
        found
    }
}

/// Shared expressions (parameters, functions), identified by `lineageTag`.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionStrategy;

impl IdentityStrategy for ExpressionStrategy {
    fn kind(&self) -> &'static str {
        "Expression"
    }

    fn locate(&self, schema: &Value) -> Vec<EntityIdentity> {
        schema
            .pointer("/model/expressions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(|(e, expression)| {
                let name = name_of(expression)?;
                let tag = expression.get("lineageTag").and_then(Value::as_str)?;
                Some(EntityIdentity {
                    key: format!("Expression: {name}"),
                    pointer: format!("/model/expressions/{e}/lineageTag"),
                    id: tag.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_keys_number_later_partitions() {
        let schema = json!({"model": {"tables": [
            {"name": "Sales", "partitions": [{"name": "Sales-a"}, {"name": "Sales-b"}]}
        ]}});
        let found = QueryStrategy.locate(&schema);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key, "Query: Sales");
        assert_eq!(found[1].key, "Query: Sales#1");
        assert_eq!(found[1].pointer, "/model/tables/0/partitions/1/name");
        assert_eq!(schema.pointer(&found[1].pointer), Some(&json!("Sales-b")));
    }

    #[test]
    fn members_without_tags_are_skipped() {
        let schema = json!({"model": {"tables": [
            {"name": "Sales", "columns": [
                {"name": "Amount", "lineageTag": "c1"},
                {"name": "RowNumber"}
            ]}
        ]}});
        let found = TableMemberStrategy::COLUMNS.locate(&schema);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "Column: Sales[Amount]");
        assert_eq!(found[0].id, "c1");
    }
}
