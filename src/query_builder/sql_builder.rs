//! A SQL builder for building SQL queries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Int(i32),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    ArrayString(Vec<String>),
    ArrayInt(Vec<i32>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryItem {
    pub field: String,
    pub value: Value,
    pub operator: String, // =, !=, like, not like, ilike, in, not in
}

impl QueryItem {
    pub fn new(field: String, value: Value, operator: String) -> Self {
        let allowed_operators = vec![
            "=", "!=", "like", "not like", "ilike", "in", "not in", "<>", "<", ">", "<=", ">=",
            "is", "is not",
        ];
        if !allowed_operators.contains(&operator.as_str()) {
            panic!("Invalid operator: {}", operator);
        }

        match value {
            Value::Int(_) | Value::Float(_) => {
                if !vec!["=", "!=", ">", "<", "<=", ">="].contains(&operator.as_str()) {
                    panic!("Invalid operator: {}", operator);
                }
            }
            Value::String(_) => {
                if !vec!["=", "!=", "like", "not like", "ilike", "<>"].contains(&operator.as_str())
                {
                    panic!("Invalid operator: {}", operator);
                }
            }
            Value::Bool(_) => {
                if !vec!["=", "!="].contains(&operator.as_str()) {
                    panic!("Invalid operator: {}", operator);
                }
            }
            Value::Null => {
                if !vec!["is", "is not"].contains(&operator.as_str()) {
                    panic!("Invalid operator: {}", operator);
                }
            }
            Value::ArrayString(_) | Value::ArrayInt(_) => {
                if !vec!["in", "not in"].contains(&operator.as_str()) {
                    panic!("Invalid operator: {}", operator);
                }
            }
        }

        Self {
            field,
            value,
            operator,
        }
    }

    pub fn default() -> Self {
        QueryItem::new(
            "1".to_string(),
            Value::String("1".to_string()),
            "=".to_string(),
        )
    }

    // Double single quotes, so a user-supplied string can't break out of the
    // SQL literal.
    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    pub fn format(&self) -> String {
        match &self.value {
            Value::Int(v) => format!("{} {} {}", self.field, self.operator, v),
            Value::Float(v) => format!("{} {} {}", self.field, self.operator, v),
            Value::String(v) => format!("{} {} {}", self.field, self.operator, Self::quote(v)),
            Value::Bool(v) => format!("{} {} {}", self.field, self.operator, v),
            Value::Null => format!("{} {} NULL", self.field, self.operator),
            Value::ArrayString(v) => {
                let values = v
                    .iter()
                    .map(|item| Self::quote(item))
                    .collect::<Vec<String>>();
                format!("{} {} ({})", self.field, self.operator, values.join(","))
            }
            Value::ArrayInt(v) => {
                let values = v
                    .iter()
                    .map(|item| format!("{}", item))
                    .collect::<Vec<String>>();
                format!("{} {} ({})", self.field, self.operator, values.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposeQueryItem {
    /// and, or
    pub operator: String,
    /// QueryItem or ComposeQuery
    pub items: Vec<ComposeQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ComposeQuery {
    QueryItem(QueryItem),
    ComposeQueryItem(ComposeQueryItem),
}

impl ComposeQuery {
    pub fn to_string(&self) -> String {
        let query_str = match self {
            ComposeQuery::QueryItem(item) => item.format(),
            ComposeQuery::ComposeQueryItem(item) => item.format(),
        };

        query_str
    }

    pub fn from_str(query_str: &str) -> Result<Option<Self>, serde_json::Error> {
        let query = if query_str == "" {
            None
        } else {
            Some(serde_json::from_str(&query_str)?)
        };

        Ok(query)
    }
}

impl ComposeQueryItem {
    pub fn new(operator: &str) -> Self {
        Self {
            operator: operator.to_string(),
            items: vec![],
        }
    }

    // Why ComposeQuery here?
    // Because we can have nested ComposeQueryItem, it maybe a QueryItem or ComposeQueryItem
    pub fn add_item(&mut self, item: ComposeQuery) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn default() -> Self {
        let mut default_query = ComposeQueryItem::new("and");
        default_query.add_item(ComposeQuery::QueryItem(QueryItem::new(
            "1".to_string(),
            Value::Int(1),
            "=".to_string(),
        )));

        default_query
    }

    pub fn format(&self) -> String {
        let mut query = String::new();

        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                query.push_str(&format!(" {} ", self.operator));
            }

            match item {
                ComposeQuery::QueryItem(item) => {
                    query.push_str(&item.format());
                }
                ComposeQuery::ComposeQueryItem(item) => {
                    query.push_str(&format!("({})", item.format()));
                }
            }
        }
        query
    }
}

// Test code
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_query() {
        let mut query = ComposeQueryItem::new("and");
        query.add_item(ComposeQuery::QueryItem(QueryItem::new(
            "blog_id".to_string(),
            Value::Int(1),
            "=".to_string(),
        )));
        query.add_item(ComposeQuery::QueryItem(QueryItem::new(
            "title".to_string(),
            Value::String("rust".to_string()),
            "ilike".to_string(),
        )));

        let mut compose_query = ComposeQueryItem::new("or");
        compose_query.add_item(ComposeQuery::QueryItem(QueryItem::new(
            "topic".to_string(),
            Value::String("Rust".to_string()),
            "=".to_string(),
        )));
        compose_query.add_item(ComposeQuery::QueryItem(QueryItem::new(
            "topic".to_string(),
            Value::Null,
            "is".to_string(),
        )));

        query.add_item(ComposeQuery::ComposeQueryItem(compose_query));

        assert_eq!(
            query.format(),
            "blog_id = 1 and title ilike 'rust' and (topic = 'Rust' or topic is NULL)"
        );
    }

    #[test]
    fn test_quote_escaping() {
        let item = QueryItem::new(
            "title".to_string(),
            Value::String("O'Reilly".to_string()),
            "=".to_string(),
        );
        assert_eq!(item.format(), "title = 'O''Reilly'");
    }

    #[test]
    fn test_from_str() {
        let query_str = r#"{"operator": "and", "items": [{"field": "blog_id", "value": 3, "operator": "="}]}"#;
        let query = ComposeQuery::from_str(query_str).unwrap().unwrap();
        assert_eq!(query.to_string(), "blog_id = 3");

        assert!(ComposeQuery::from_str("").unwrap().is_none());
        assert!(ComposeQuery::from_str("not json").is_err());
    }
}
