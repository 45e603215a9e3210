use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::Value;

use crate::ai::backend::Payload;
use crate::error::StagingError;

/// Flattens any backend payload shape into one non-empty byte buffer.
pub async fn decode_payload(payload: Payload) -> Result<Bytes, StagingError> {
    let bytes = match payload {
        Payload::Bytes(bytes) => bytes,
        Payload::Stream(mut stream) => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|err| {
                    StagingError::Generation(format!("reading streamed image failed: {err}"))
                })?;
                buffer.extend_from_slice(&chunk);
            }
            buffer.freeze()
        }
        Payload::Object(value) => Bytes::from(decode_object(&value)?),
    };
    if bytes.is_empty() {
        return Err(StagingError::EmptyGeneration);
    }
    Ok(bytes)
}

fn decode_object(value: &Value) -> Result<Vec<u8>, StagingError> {
    match value.get("image") {
        Some(Value::Array(items)) => return byte_array(items),
        Some(Value::String(encoded)) => return decode_base64_image(encoded),
        _ => {}
    }
    if let Some(Value::Array(images)) = value.get("images") {
        return match images.first() {
            Some(Value::String(encoded)) => decode_base64_image(encoded),
            Some(other) => Err(StagingError::UnknownResponsePayload(format!(
                "images[0] is {}, expected a base64 string",
                kind_of(other)
            ))),
            None => Err(StagingError::EmptyGeneration),
        };
    }
    Err(StagingError::UnknownResponsePayload(describe(value)))
}

fn byte_array(items: &[Value]) -> Result<Vec<u8>, StagingError> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| {
                    StagingError::UnknownResponsePayload(format!(
                        "image buffer holds a non-byte value: {item}"
                    ))
                })
        })
        .collect()
}

/// Decodes base64 image data, accepting an optional `data:image/...;base64,` prefix.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, StagingError> {
    let trimmed = encoded.trim();
    let data = strip_data_url_prefix(trimmed).unwrap_or(trimmed);
    STANDARD.decode(data).map_err(|err| {
        StagingError::UnknownResponsePayload(format!("image field is not valid base64: {err}"))
    })
}

fn strip_data_url_prefix(value: &str) -> Option<&str> {
    let rest = value.strip_prefix("data:image/")?;
    let (_, data) = rest.split_once(";base64,")?;
    Some(data)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        other => kind_of(other).to_string(),
    }
}
