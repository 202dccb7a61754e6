use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One loosely-typed match returned by the search API.
///
/// Records have no fixed schema: host results expose paths such as
/// `portinfo.port`, web results expose `webapp` or `site`. Every nested
/// mapping is decoded into the same `serde_json::Map`, so traversal only has
/// to match on the value tag.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// Walks a dotted path (`geoinfo.country.names.en`).
    ///
    /// Returns `None` when a segment is missing, when a non-map value sits in
    /// the middle of the path, or when the value found is JSON `null`. The
    /// last segment may resolve to any value, including lists and maps.
    pub fn find(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').peekable();
        let mut current = &self.0;
        while let Some(segment) = segments.next() {
            let value = current.get(segment)?;
            let is_last = segments.peek().is_none();
            match value {
                Value::Null => return None,
                Value::Object(map) if !is_last => current = map,
                _ if is_last => return Some(value),
                _ => return None,
            }
        }
        None
    }

    /// Like [`Record::find`] but renders the value; missing paths yield `""`.
    pub fn find_string(&self, path: &str) -> String {
        self.find(path).map(value_to_string).unwrap_or_default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Default textual form of a record value.
///
/// Strings are rendered bare, lists are joined with `,` and maps fall back to
/// compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<String>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}
