use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Mime type assumed for untyped legacy payloads whose bytes match no known signature.
pub const LEGACY_FALLBACK_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("proof is not embedded")]
    NotInline,
    #[error("unsupported proof media type '{0}'")]
    UnsupportedMime(String),
}

/// Review proof as carried by every storage tier.
///
/// `Inline` always knows its mime type; untyped legacy strings are converted
/// by [`ProofPayload::repair_legacy`] before anything else sees them.
/// `Pointer` references a large object parked in browser-local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProofPayload {
    Inline { mime_type: String, data: String },
    Hosted { url: String, media_kind: MediaKind },
    Pointer { object_key: String },
}

impl ProofPayload {
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data: B64.encode(bytes),
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn parse_data_uri(uri: &str) -> Result<Self, ProofError> {
        let rest = uri.trim().strip_prefix("data:").ok_or(ProofError::NotDataUri)?;
        let (header, data) = rest.split_once(',').ok_or(ProofError::NotDataUri)?;

        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !parts.any(|p| p.trim() == "base64") || !mime.contains('/') {
            return Err(ProofError::NotDataUri);
        }

        Ok(Self::Inline {
            mime_type: mime,
            data: data.trim().to_string(),
        })
    }

    /// Repair a proof string written before payloads were tagged.
    ///
    /// Data URIs keep their declared type. Bare base64 is typed from its
    /// leading bytes; when nothing matches, the legacy image default applies.
    pub fn repair_legacy(raw: &str) -> Self {
        if let Ok(parsed) = Self::parse_data_uri(raw) {
            return parsed;
        }

        let data: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let mime_type = match sniff_mime(&data) {
            Some(mime) => mime.to_string(),
            None => {
                warn!(
                    "Untyped proof payload ({} chars) matched no known signature, assuming {}",
                    data.len(),
                    LEGACY_FALLBACK_MIME
                );
                LEGACY_FALLBACK_MIME.to_string()
            }
        };

        Self::Inline { mime_type, data }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Self::Inline { mime_type, .. } => MediaKind::from_mime(mime_type),
            Self::Hosted { media_kind, .. } => Some(*media_kind),
            Self::Pointer { .. } => None,
        }
    }

    pub fn to_data_uri(&self) -> Option<String> {
        match self {
            Self::Inline { mime_type, data } => Some(format!("data:{};base64,{}", mime_type, data)),
            _ => None,
        }
    }

    /// Decode an inline payload into `(mime_type, bytes)`.
    pub fn decode(&self) -> Result<(&str, Vec<u8>), ProofError> {
        match self {
            Self::Inline { mime_type, data } => Ok((mime_type.as_str(), B64.decode(data)?)),
            _ => Err(ProofError::NotInline),
        }
    }
}

/// Accepts either a tagged payload or a legacy string (data URI or bare base64).
/// Used on tier records that may predate tagging.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<ProofPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ProofWire {
        Tagged(ProofPayload),
        Legacy(String),
    }

    let wire = Option::<ProofWire>::deserialize(deserializer)?;
    Ok(match wire {
        Some(ProofWire::Tagged(proof)) => Some(proof),
        Some(ProofWire::Legacy(raw)) if raw.trim().is_empty() => None,
        Some(ProofWire::Legacy(raw)) => Some(ProofPayload::repair_legacy(&raw)),
        None => None,
    })
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Identify a media type from the first bytes of a base64 body.
fn sniff_mime(b64: &str) -> Option<&'static str> {
    // 24 chars decode to 18 bytes without touching padding
    let head = b64.get(..24).unwrap_or(b64);
    let bytes = B64.decode(head).ok()?;

    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("video/webm");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(match &bytes[8..12] {
            b"heic" | b"heix" | b"heif" | b"mif1" => "image/heic",
            b"qt  " => "video/quicktime",
            _ => "video/mp4",
        });
    }
    None
}
