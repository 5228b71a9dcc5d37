//! Message framing for newline-delimited JSON.

use base64::Engine;
use image::GenericImageView;
use serde::{Deserialize, Serialize};

use streetcache::{codec, Angle, ImageRequest, Location, Panorama};

use crate::error::{CliError, CliResult};

/// One input line.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Raw request: prefetch the headings around `angle` near this spot.
    Request { lat: f64, lng: f64, angle: Angle },
    /// Position query: answer with the best cached panorama.
    Position { lat: f64, lng: f64, angle: Angle },
}

impl Command {
    pub fn image_request(&self) -> ImageRequest {
        match *self {
            Command::Request { lat, lng, angle } | Command::Position { lat, lng, angle } => {
                ImageRequest::new(Location::new(lat, lng), angle)
            }
        }
    }
}

/// One output line, answering the `seq`-th position query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionResult {
    pub seq: u64,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_base64: Option<String>,
}

impl PositionResult {
    pub fn missing(seq: u64) -> Self {
        Self {
            seq,
            found: false,
            width: None,
            height: None,
            jpeg_base64: None,
        }
    }

    pub fn from_panorama(seq: u64, image: &Panorama, quality: u8) -> CliResult<Self> {
        let (width, height) = image.dimensions();
        let jpeg = codec::encode_jpeg(image, quality)?;
        Ok(Self {
            seq,
            found: true,
            width: Some(width),
            height: Some(height),
            jpeg_base64: Some(base64::engine::general_purpose::STANDARD.encode(jpeg)),
        })
    }
}

/// Parse a single line of text as a command.
pub fn parse_command(line: &str) -> CliResult<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CliError::Parse("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| CliError::Parse(e.to_string()))
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message<T: Serialize>(value: &T) -> CliResult<String> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}

/// Frame an error report for a line that could not be handled.
pub fn frame_error(error: &CliError) -> CliResult<String> {
    frame_message(&serde_json::json!({ "error": error.to_string() }))
}
