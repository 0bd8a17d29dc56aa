use super::Operation;
use crate::error::ApiError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Query-string options as they arrive. Every knob is optional; operations
/// that do not read a knob ignore it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOptions {
    pub quality: Option<u8>,
    pub count: Option<u8>,
    pub blur_strength: Option<u8>,
    pub background_type: Option<String>,
    pub ratio: Option<String>,
}

/// Target canvas proportions for `extend`, parsed from `W:H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub w: u32,
    pub h: u32,
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("ratio must look like W:H, got {:?}", s))?;
        let w: u32 = w.trim().parse().map_err(|_| "ratio width must be a number".to_string())?;
        let h: u32 = h.trim().parse().map_err(|_| "ratio height must be a number".to_string())?;
        if !(1..=64).contains(&w) || !(1..=64).contains(&h) {
            return Err("ratio sides must be between 1 and 64".to_string());
        }
        Ok(AspectRatio { w, h })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.w, self.h)
    }
}

/// Fully resolved options after per-operation validation and defaulting.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub quality: u8,
    pub palette_count: usize,
    pub blur_strength: u8,
    pub background_type: String,
    pub ratio: AspectRatio,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            quality: 85,
            palette_count: 5,
            blur_strength: 15,
            background_type: "professional".to_string(),
            ratio: AspectRatio { w: 9, h: 16 },
        }
    }
}

impl TransformOptions {
    /// Validates the knobs the operation actually reads and fills the rest
    /// with defaults. Out-of-range values on a relevant knob are a
    /// BadRequest; irrelevant knobs are ignored like unknown query params.
    pub fn resolve(op: Operation, raw: &RawOptions) -> Result<TransformOptions, ApiError> {
        let mut opts = TransformOptions::default();

        match op {
            Operation::Compress => {
                if let Some(q) = raw.quality {
                    if !(1..=100).contains(&q) {
                        return Err(ApiError::BadRequest(
                            "quality must be between 1 and 100".to_string(),
                        ));
                    }
                    opts.quality = q;
                }
            }
            Operation::Palette => {
                if let Some(c) = raw.count {
                    if !(2..=10).contains(&c) {
                        return Err(ApiError::BadRequest(
                            "count must be between 2 and 10".to_string(),
                        ));
                    }
                    opts.palette_count = c as usize;
                }
            }
            Operation::PortraitMode => {
                if let Some(b) = raw.blur_strength {
                    if !(1..=100).contains(&b) {
                        return Err(ApiError::BadRequest(
                            "blur_strength must be between 1 and 100".to_string(),
                        ));
                    }
                    opts.blur_strength = b;
                }
            }
            Operation::InstantStudio => {
                if let Some(bg) = raw.background_type.as_deref() {
                    let bg = bg.trim();
                    if bg.is_empty() || bg.len() > 64 {
                        return Err(ApiError::BadRequest(
                            "background_type must be 1-64 characters".to_string(),
                        ));
                    }
                    opts.background_type = bg.to_string();
                }
            }
            Operation::Extend => {
                if let Some(r) = raw.ratio.as_deref() {
                    opts.ratio = r.parse::<AspectRatio>().map_err(ApiError::BadRequest)?;
                }
            }
            _ => {}
        }

        Ok(opts)
    }

    /// Option fields forwarded to the inference backend as multipart text
    /// parts, limited to what the model for this operation consumes.
    pub fn form_fields(&self, op: Operation) -> Vec<(&'static str, String)> {
        match op {
            Operation::PortraitMode => {
                vec![("blur_strength", self.blur_strength.to_string())]
            }
            Operation::InstantStudio => {
                vec![("background_type", self.background_type.clone())]
            }
            _ => Vec::new(),
        }
    }
}
