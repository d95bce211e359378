//! Wire-format mirror of the protocol types
//!
//! The backend speaks camelCase JSON (`functionCall`, `thoughtSignature`,
//! `usageMetadata`); the domain types serialize in the session-file shape.
//! This module keeps the two apart with explicit converters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gmn_protocol::{
    Content, FunctionCall, GenerateRequest, JsonMap, Part, Role, StreamEvent, TokenUsage, ToolDecl,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub model: String,
    pub project: String,
    pub user_prompt_id: String,
    pub request: WireInnerRequest,
}

#[derive(Debug, Serialize)]
pub struct WireInnerRequest {
    pub contents: Vec<WireContent>,
    pub config: WireGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireToolGroup>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireToolGroup {
    pub function_declarations: Vec<WireFunctionDecl>,
}

#[derive(Debug, Serialize)]
pub struct WireFunctionDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireContent {
    pub role: String,
    pub parts: Vec<WirePart>,
}

/// A wire part carries at most one payload field; the thought signature
/// rides at the part level next to `functionCall`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<WireFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: JsonMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireFunctionResponse {
    pub id: String,
    pub name: String,
    pub response: JsonMap,
}

// Streamed response chunks. Depending on the endpoint the candidate body
// arrives bare or wrapped in a `response` envelope; both decode here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChunk {
    #[serde(default)]
    pub response: Option<WireChunkBody>,
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChunkBody {
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireCandidate {
    #[serde(default)]
    pub content: WireCandidateContent,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireCandidateContent {
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl WireChunk {
    pub fn into_body(self) -> WireChunkBody {
        self.response.unwrap_or(WireChunkBody {
            candidates: self.candidates,
            usage_metadata: self.usage_metadata,
        })
    }
}

impl WireChunkBody {
    /// Decode one incremental chunk into stream events, preserving the
    /// left-to-right order of parts
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for candidate in self.candidates {
            for part in candidate.content.parts {
                if let Some(text) = part.text {
                    if !text.is_empty() {
                        events.push(StreamEvent::TextChunk(text));
                    }
                }
                if let Some(call) = part.function_call {
                    events.push(StreamEvent::ToolCall(FunctionCall {
                        id: call.id,
                        name: call.name,
                        args: call.args,
                        thought_signature: part.thought_signature.clone(),
                    }));
                }
            }
        }

        if let Some(usage) = self.usage_metadata {
            events.push(StreamEvent::Done {
                usage: Some(TokenUsage::new(
                    usage.prompt_token_count,
                    usage.candidates_token_count,
                )),
            });
        }

        events
    }
}

pub fn encode_request(req: &GenerateRequest) -> WireRequest {
    WireRequest {
        model: req.model.clone(),
        project: req.project.clone(),
        user_prompt_id: req.user_prompt_id.clone(),
        request: WireInnerRequest {
            contents: req.contents.iter().map(encode_content).collect(),
            config: WireGenerationConfig {
                temperature: req.config.temperature,
                top_p: req.config.top_p,
                max_output_tokens: req.config.max_output_tokens,
            },
            tools: if req.tools.is_empty() {
                None
            } else {
                Some(vec![WireToolGroup {
                    function_declarations: req.tools.iter().map(encode_tool_decl).collect(),
                }])
            },
        },
    }
}

fn encode_tool_decl(decl: &ToolDecl) -> WireFunctionDecl {
    WireFunctionDecl {
        name: decl.name.clone(),
        description: decl.description.clone(),
        parameters: decl.parameters.clone(),
    }
}

fn encode_content(content: &Content) -> WireContent {
    WireContent {
        role: match content.role {
            Role::User => "user".to_string(),
            Role::Model => "model".to_string(),
        },
        parts: content.parts.iter().map(encode_part).collect(),
    }
}

fn encode_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::FunctionCall(fc) => WirePart {
            function_call: Some(WireFunctionCall {
                id: fc.id.clone(),
                name: fc.name.clone(),
                args: fc.args.clone(),
            }),
            thought_signature: fc.thought_signature.clone(),
            ..Default::default()
        },
        Part::FunctionResponse(fr) => WirePart {
            function_response: Some(WireFunctionResponse {
                id: fr.id.clone(),
                name: fr.name.clone(),
                response: fr.response.clone(),
            }),
            ..Default::default()
        },
    }
}
