use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canvas ids arrive as JSON numbers but are used as path segments, so both
/// numeric and string forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanvasId(pub String);

impl<'de> Deserialize<'de> for CanvasId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => CanvasId(n.to_string()),
            Raw::Str(s) => CanvasId(s),
        })
    }
}

impl std::fmt::Display for CanvasId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of `GET /courses/:id/assignments`.
#[derive(Deserialize, Debug, Clone)]
pub struct Assignment {
    pub id: CanvasId,
    pub name: String,
    #[serde(default, deserialize_with = "string_or_none")]
    pub due_at: Option<String>,
}

/// Any non-string value (number, object, ...) reads as absent.
fn string_or_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// `GET /courses/:course/assignments/:assignment/submissions/:user`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Submission {
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl Submission {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// `GET /users/self/observees`.
#[derive(Deserialize, Debug, Clone)]
pub struct Observee {
    pub id: CanvasId,
    pub name: String,
}
