use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{
    domain::{Column, LayerTarget, RowIndex},
    error::ConsoleError,
};

pub const DEFAULT_COLOUR_POINTER: &str = "/video/effects/0/params/Color/value";
const API_PREFIX: [&str; 2] = ["api", "v1"];

/// How a (layer, row) choice is expressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WireContract {
    /// `PUT {base}/layers/{target}/clips/1` carrying the colour in a templated body.
    #[default]
    ColourWrite,
    /// `POST {base}/layers/{target}/clips/{row+1}/connect` with no body.
    ClipConnect,
}

impl FromStr for WireContract {
    type Err = ConsoleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "colour_write" | "color_write" => Ok(Self::ColourWrite),
            "clip_connect" => Ok(Self::ClipConnect),
            other => Err(ConsoleError::InvalidConfigValue(format!(
                "unknown wire contract '{other}'"
            ))),
        }
    }
}

/// One resolved write for a concrete column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerWrite {
    pub column: Column,
    pub target: LayerTarget,
    pub row: RowIndex,
    pub colour: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        })
    }
}

/// A fully formed request; workers send it as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub column: Column,
    pub method: HttpMethod,
    pub url: Url,
    pub body: Option<Value>,
}

/// `http://{host}:{port}/api/v1` root of the composition engine's REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    api_root: Url,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Result<Self, ConsoleError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConsoleError::InvalidEndpoint("empty host".to_string()));
        }
        let mut api_root = Url::parse(&format!("http://{host}:{port}"))
            .map_err(|e| ConsoleError::InvalidEndpoint(format!("{host}:{port}: {e}")))?;
        api_root
            .path_segments_mut()
            .map_err(|_| ConsoleError::InvalidEndpoint(format!("{host}:{port} cannot be a base")))?
            .clear()
            .extend(API_PREFIX);
        Ok(Self { api_root })
    }

    pub fn host(&self) -> &str {
        self.api_root.host_str().unwrap_or_default()
    }

    pub fn product_url(&self) -> Url {
        self.with_segments(&["product"])
    }

    pub fn clip_url(&self, target: &LayerTarget, clip: usize, action: Option<&str>) -> Url {
        let target = target.to_string();
        let clip = clip.to_string();
        let mut segments = vec!["composition", "layers", target.as_str(), "clips", clip.as_str()];
        segments.extend(action);
        self.with_segments(&segments)
    }

    fn with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        // api_root is always an http URL, so it has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_root)
    }
}

/// JSON document sent by the colour-write contract, with the colour slot
/// addressed by a JSON pointer. Everything outside the slot passes through.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate {
    document: Value,
    pointer: String,
}

impl Default for PayloadTemplate {
    fn default() -> Self {
        Self {
            document: json!({
                "video": { "effects": [ { "params": { "Color": { "value": "#FFFFFF" } } } ] }
            }),
            pointer: DEFAULT_COLOUR_POINTER.to_string(),
        }
    }
}

impl PayloadTemplate {
    pub fn new(document: Value, pointer: impl Into<String>) -> Result<Self, ConsoleError> {
        let pointer = pointer.into();
        if document.pointer(&pointer).is_none() {
            return Err(ConsoleError::InvalidPayloadTemplate(format!(
                "pointer '{pointer}' does not resolve in template"
            )));
        }
        Ok(Self { document, pointer })
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn render(&self, colour: &str) -> Value {
        let mut document = self.document.clone();
        if let Some(slot) = document.pointer_mut(&self.pointer) {
            *slot = Value::String(colour.to_string());
        }
        document
    }
}

/// Wire contract plus the data it needs, chosen once per deployment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireFormat {
    pub contract: WireContract,
    pub template: PayloadTemplate,
}

impl WireFormat {
    pub fn new(contract: WireContract, template: PayloadTemplate) -> Self {
        Self { contract, template }
    }

    pub fn request(&self, endpoint: &Endpoint, write: &LayerWrite) -> OutboundRequest {
        match self.contract {
            WireContract::ColourWrite => OutboundRequest {
                column: write.column.clone(),
                method: HttpMethod::Put,
                url: endpoint.clip_url(&write.target, 1, None),
                body: Some(self.template.render(&write.colour)),
            },
            WireContract::ClipConnect => OutboundRequest {
                column: write.column.clone(),
                method: HttpMethod::Post,
                url: endpoint.clip_url(&write.target, write.row.0 + 1, Some("connect")),
                body: None,
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
