//! Query languages a definition scope can declare.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DefinitionError;

/// The expression language active for a scope or a single state.
///
/// Unset scopes default to [`QueryLanguage::JsonPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueryLanguage {
    /// Legacy path-based processing (`InputPath`, `Parameters`, `ItemsPath`, ...).
    #[default]
    #[serde(rename = "JSONPath")]
    JsonPath,
    /// Expression-based processing (`Arguments`, `Output`, `Items`, `{% %}`).
    #[serde(rename = "JSONata")]
    Jsonata,
}

impl QueryLanguage {
    /// The wire name used in definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLanguage::JsonPath => "JSONPath",
            QueryLanguage::Jsonata => "JSONata",
        }
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryLanguage {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSONPath" => Ok(QueryLanguage::JsonPath),
            "JSONata" => Ok(QueryLanguage::Jsonata),
            other => Err(DefinitionError::UnsupportedQueryLanguage {
                language: other.to_string(),
            }),
        }
    }
}

/// Read the optional `QueryLanguage` field of a scope or state object.
pub(crate) fn declared_language(obj: &Value) -> Result<Option<QueryLanguage>, DefinitionError> {
    match obj.get("QueryLanguage") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(DefinitionError::UnsupportedQueryLanguage {
            language: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_languages() {
        assert_eq!(
            "JSONPath".parse::<QueryLanguage>().unwrap(),
            QueryLanguage::JsonPath
        );
        assert_eq!(
            "JSONata".parse::<QueryLanguage>().unwrap(),
            QueryLanguage::Jsonata
        );
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "XPath".parse::<QueryLanguage>().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnsupportedQueryLanguage {
                language: "XPath".to_string()
            }
        );
    }

    #[test]
    fn absent_field_is_none() {
        assert_eq!(declared_language(&json!({"Type": "Pass"})).unwrap(), None);
    }

    #[test]
    fn non_string_field_is_rejected() {
        assert!(declared_language(&json!({"QueryLanguage": 3})).is_err());
    }
}
