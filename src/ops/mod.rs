pub mod params;

use crate::error::ApiError;
use crate::models::PlanTier;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

/// The 15 metered operations, one per `/v1/{route}` endpoint.
///
/// Everything route-specific hangs off this enum as a static table: path,
/// minimum tier, output type, time budget, engine. Access control is a
/// single ordered comparison against [`PlanTier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Compress,
    Palette,
    SignatureRip,
    AutoTag,
    Upscale,
    RemoveBg,
    PortraitMode,
    StickerMaker,
    Colorize,
    Anime,
    InstantStudio,
    Extend,
    MagicErase,
    Vectorize,
    PrivacyBlur,
}

/// Declared response body type of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Png,
    Jpeg,
    Svg,
    Json,
}

impl OutputKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputKind::Png => "image/png",
            OutputKind::Jpeg => "image/jpeg",
            OutputKind::Svg => "image/svg+xml",
            OutputKind::Json => "application/json",
        }
    }
}

static ROUTE_INDEX: Lazy<HashMap<&'static str, Operation>> =
    Lazy::new(|| Operation::ALL.iter().map(|op| (op.route(), *op)).collect());

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Compress,
        Operation::Palette,
        Operation::SignatureRip,
        Operation::AutoTag,
        Operation::Upscale,
        Operation::RemoveBg,
        Operation::PortraitMode,
        Operation::StickerMaker,
        Operation::Colorize,
        Operation::Anime,
        Operation::InstantStudio,
        Operation::Extend,
        Operation::MagicErase,
        Operation::Vectorize,
        Operation::PrivacyBlur,
    ];

    /// Path segment under `/v1`.
    pub fn route(&self) -> &'static str {
        match self {
            Operation::Compress => "compress",
            Operation::Palette => "palette",
            Operation::SignatureRip => "signature-rip",
            Operation::AutoTag => "auto-tag",
            Operation::Upscale => "upscale",
            Operation::RemoveBg => "remove-bg",
            Operation::PortraitMode => "portrait-mode",
            Operation::StickerMaker => "sticker-maker",
            Operation::Colorize => "colorize",
            Operation::Anime => "anime",
            Operation::InstantStudio => "instant-studio",
            Operation::Extend => "extend",
            Operation::MagicErase => "magic-erase",
            Operation::Vectorize => "vectorize",
            Operation::PrivacyBlur => "privacy-blur",
        }
    }

    pub fn from_route(route: &str) -> Option<Operation> {
        ROUTE_INDEX.get(route).copied()
    }

    /// Lowest tier allowed to call this operation.
    pub fn min_tier(&self) -> PlanTier {
        match self {
            Operation::Compress
            | Operation::Palette
            | Operation::SignatureRip
            | Operation::AutoTag => PlanTier::Free,
            Operation::Upscale
            | Operation::RemoveBg
            | Operation::PortraitMode
            | Operation::StickerMaker => PlanTier::Starter,
            Operation::Colorize
            | Operation::Anime
            | Operation::InstantStudio
            | Operation::Extend => PlanTier::Pro,
            Operation::MagicErase | Operation::Vectorize | Operation::PrivacyBlur => {
                PlanTier::Enterprise
            }
        }
    }

    pub fn output(&self) -> OutputKind {
        match self {
            Operation::Compress => OutputKind::Jpeg,
            Operation::Palette | Operation::AutoTag => OutputKind::Json,
            Operation::Vectorize => OutputKind::Svg,
            _ => OutputKind::Png,
        }
    }

    /// Wall-clock budget for the transformation itself. The in-process
    /// engines finish well under theirs; the remote ones get headroom for
    /// model cold starts.
    pub fn time_budget(&self) -> Duration {
        match self {
            Operation::Compress
            | Operation::Palette
            | Operation::SignatureRip
            | Operation::Extend
            | Operation::Vectorize => Duration::from_secs(30),
            Operation::Upscale => Duration::from_secs(120),
            Operation::Colorize | Operation::MagicErase => Duration::from_secs(90),
            _ => Duration::from_secs(60),
        }
    }

    /// Whether the multipart body must carry a second `mask` image.
    pub fn requires_mask(&self) -> bool {
        matches!(self, Operation::MagicErase)
    }

    /// Runs in-process rather than on the inference backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Operation::Compress
                | Operation::Palette
                | Operation::SignatureRip
                | Operation::Extend
                | Operation::Vectorize
        )
    }

    /// Model identifier sent to the inference backend for remote operations.
    pub fn model_id(&self) -> &'static str {
        match self {
            Operation::AutoTag => "mobilenet-autotag",
            Operation::Upscale => "realesrgan-x4",
            Operation::RemoveBg => "birefnet-general",
            Operation::PortraitMode => "portrait-depth-blur",
            Operation::StickerMaker => "sticker-outline",
            Operation::Colorize => "ddcolor",
            Operation::Anime => "animegan-v3",
            Operation::InstantStudio => "studio-relight",
            Operation::MagicErase => "lama-inpaint",
            Operation::PrivacyBlur => "face-privacy-blur",
            _ => "",
        }
    }

    pub fn ensure_allowed(&self, tier: PlanTier) -> Result<(), ApiError> {
        if tier >= self.min_tier() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "/v1/{} requires the {} tier or higher (current tier: {})",
                self.route(),
                self.min_tier(),
                tier
            )))
        }
    }

    /// Routes reachable at a tier, in table order.
    pub fn accessible(tier: PlanTier) -> impl Iterator<Item = Operation> {
        Operation::ALL
            .into_iter()
            .filter(move |op| op.min_tier() <= tier)
    }
}
