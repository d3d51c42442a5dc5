//! Subtitle style parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caption anchor, using ASS numpad alignment codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    BottomCenter,
    MiddleCenter,
    TopCenter,
}

impl Alignment {
    /// ASS `Alignment` value (numpad layout).
    pub fn ass_code(&self) -> u8 {
        match self {
            Alignment::BottomCenter => 2,
            Alignment::MiddleCenter => 5,
            Alignment::TopCenter => 8,
        }
    }
}

/// Resolved style for the burned-in captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleParams {
    /// Font size in pixels at the video's play resolution
    pub font_size: u32,
    /// Letter spacing in pixels
    pub spacing: f64,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_vertical: u32,
    pub alignment: Alignment,
}
