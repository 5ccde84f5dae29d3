//! Todo record types.

use serde::{Deserialize, Deserializer, Serialize};

/// A persisted todo.
///
/// `id` is assigned by the store on insert and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Store-assigned identifier.
    pub id: i64,
    /// Caller-supplied title.
    pub title: String,
}

/// Payload for creating a todo.
///
/// A missing or `null` title is an empty title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    /// Title of the todo to create.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Todo {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_json_shape() {
        let todo = Todo {
            id: 1,
            title: "buy milk".to_string(),
        };
        let json = serde_json::to_string(&todo).unwrap();
        assert_eq!(json, r#"{"id":1,"title":"buy milk"}"#);
    }

    #[test]
    fn test_new_todo_ignores_unknown_fields() {
        let new: NewTodo = serde_json::from_str(r#"{"title":"x","done":true}"#).unwrap();
        assert_eq!(new.title, "x");
    }

    #[test]
    fn test_new_todo_title_defaults_to_empty() {
        let new: NewTodo = serde_json::from_str("{}").unwrap();
        assert_eq!(new, NewTodo::default());
        let new: NewTodo = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert_eq!(new.title, "");
        assert!(serde_json::from_str::<NewTodo>(r#"{"title":7}"#).is_err());
    }
}
