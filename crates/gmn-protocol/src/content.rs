//! Conversation turns and parts

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::JsonMap;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn in the conversation: a role plus an ordered list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A model turn carrying a single function call, signature included
    pub fn model_call(call: FunctionCall) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::FunctionCall(call)],
        }
    }

    /// The user-role turn that carries a tool response back to the model
    pub fn user_response(response: FunctionResponse) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::FunctionResponse(response)],
        }
    }
}

/// A single part of a turn.
///
/// Exactly one variant is populated; the JSON form is a single-key object
/// (`{"text": ...}`, `{"function_call": {...}}`, `{"function_response":
/// {...}}`), matching the session file format.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(fc) => Some(fc),
            _ => None,
        }
    }

    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        match self {
            Self::FunctionResponse(fr) => Some(fr),
            _ => None,
        }
    }
}

/// A tool invocation requested by the model.
///
/// `thought_signature` is opaque continuity data some models attach; it must
/// be echoed back byte-for-byte on re-send and is never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: JsonMap) -> Self {
        Self {
            id: None,
            name: name.into(),
            args,
            thought_signature: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.thought_signature = Some(signature.into());
        self
    }
}

/// The result of a tool invocation, paired to its call by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: JsonMap,
}

// Serialized mirror of Part: all-optional fields so the on-disk form is the
// single-key object the session format specifies.
#[derive(Default, Serialize, Deserialize)]
struct PartRepr {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Part::Text(text) => PartRepr {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::FunctionCall(fc) => PartRepr {
                function_call: Some(fc.clone()),
                ..Default::default()
            },
            Part::FunctionResponse(fr) => PartRepr {
                function_response: Some(fr.clone()),
                ..Default::default()
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = PartRepr::deserialize(deserializer)?;
        if let Some(text) = repr.text {
            Ok(Part::Text(text))
        } else if let Some(fc) = repr.function_call {
            Ok(Part::FunctionCall(fc))
        } else if let Some(fr) = repr.function_response {
            Ok(Part::FunctionResponse(fr))
        } else {
            Err(D::Error::custom("part has no recognized discriminant"))
        }
    }
}
