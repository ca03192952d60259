//! Post-processing for hosted image generation calls.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::RondoError;
use crate::tools::{ToolDefinition, ToolHandler, ToolInvocation};
use crate::types::{OutputItem, ToolOutput};

/// Destination for decoded images.
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store one image and return where it went.
    async fn store(&self, call_id: &str, bytes: &[u8], format: &str) -> Result<String, RondoError>;
}

/// Writes images into a directory, named by the SHA-256 of their bytes.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageSink for DirectorySink {
    async fn store(&self, _call_id: &str, bytes: &[u8], format: &str) -> Result<String, RondoError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.{format}", sha256_hex(bytes)));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.display().to_string())
    }
}

/// Decodes the base64 result of an `image_generation_call` and hands the
/// bytes to a sink. Declares the `image_generation` tool to the remote API.
pub struct ImageGenerationTool<S> {
    definition: ToolDefinition,
    sink: S,
}

impl<S: ImageSink> ImageGenerationTool<S> {
    pub fn new(sink: S) -> Self {
        Self {
            definition: ToolDefinition::image_generation(),
            sink,
        }
    }

    /// Ask the remote API for `count` streamed previews per image.
    pub fn with_partial_images(mut self, count: u32) -> Self {
        self.definition = self.definition.with_option("partial_images", json!(count));
        self
    }

    /// Any other `image_generation` tool field (`size`, `quality`...).
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.definition = self.definition.with_option(key, value);
        self
    }
}

#[async_trait]
impl<S: ImageSink + 'static> ToolHandler for ImageGenerationTool<S> {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        let OutputItem::ImageGenerationCall(call) = invocation.item() else {
            return Err(RondoError::HandlerExecution {
                tool_name: "image_generation".into(),
                message: format!("cannot process {} item", invocation.item().type_name()),
            });
        };
        let encoded = call.result.as_deref().ok_or_else(|| RondoError::HandlerExecution {
            tool_name: "image_generation".into(),
            message: format!("image call {} carried no result", call.id),
        })?;
        let bytes = decode_image(encoded)?;
        let format = call.output_format.as_deref().unwrap_or("png");
        let location = self.sink.store(&call.id, &bytes, format).await?;
        tracing::debug!(call_id = %call.id, bytes = bytes.len(), %location, "stored generated image");
        Ok(invocation.json(&json!({
            "location": location,
            "bytes": bytes.len(),
            "sha256": sha256_hex(&bytes),
        })))
    }
}

/// Decode a base64 image payload, tolerating a `data:` URL prefix.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, RondoError> {
    let raw = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    STANDARD
        .decode(raw.trim())
        .map_err(|e| RondoError::HandlerExecution {
            tool_name: "image_generation".into(),
            message: format!("invalid base64 image: {e}"),
        })
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
