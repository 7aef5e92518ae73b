// Cache fingerprint construction
//
// Format:
// - "img:{key}?{name=value&...}" with fields sorted by name
// - "img:{key}" when no field is present
// - "img:{key}#sha256:{hex}" when the parameter part would push the
//   fingerprint past MAX_FINGERPRINT_LENGTH

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::constants::{FINGERPRINT_PREFIX, MAX_FINGERPRINT_LENGTH};
use crate::image_optimizer::{TransformSpec, ValidationResult};
use crate::storage::ObjectMetadata;

/// Deterministic cache key for one transformation of one source object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True when the parameter part was replaced by its digest
    pub fn is_hashed(&self) -> bool {
        self.0.contains("#sha256:")
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the full fingerprint for a request
///
/// Only fields that change the output bytes are serialised: switched-off
/// flags and zero adjustments are omitted, rotation is reduced modulo 360
/// and the compression level only counts when optimisation is on.
pub fn build_fingerprint(
    key: &str,
    spec: &TransformSpec,
    validation: Option<&ValidationResult>,
    metadata: Option<&ObjectMetadata>,
) -> Fingerprint {
    let mut fields: BTreeMap<&'static str, String> = BTreeMap::new();

    if let Some(format) = spec.format {
        fields.insert("format", format.as_str().to_string());
    }
    if let Some(quality) = spec.quality {
        fields.insert("quality", quality.to_string());
    }
    if spec.optimize {
        fields.insert("optimize", "true".to_string());
        if let Some(level) = spec.compression_level {
            fields.insert("compressionLevel", level.to_string());
        }
    }
    if let Some(width) = spec.width {
        fields.insert("width", width.to_string());
    }
    if let Some(height) = spec.height {
        fields.insert("height", height.to_string());
    }
    if let Some(fit) = spec.fit {
        fields.insert("fit", fit.as_str().to_string());
    }
    if let Some(position) = spec.position {
        fields.insert("position", position.as_str().to_string());
    }
    if let Some(rotate) = spec.rotate.map(|r| r.rem_euclid(360)).filter(|r| *r != 0) {
        fields.insert("rotate", rotate.to_string());
    }
    if let Some(brightness) = spec.brightness.filter(|b| *b != 0) {
        fields.insert("brightness", brightness.to_string());
    }
    if let Some(contrast) = spec.contrast.filter(|c| *c != 0) {
        fields.insert("contrast", contrast.to_string());
    }
    if spec.grayscale {
        fields.insert("grayscale", "true".to_string());
    }
    if let Some(saturation) = spec.saturation.filter(|s| *s != 0) {
        fields.insert("saturation", saturation.to_string());
    }
    if let Some(crop) = spec.crop {
        fields.insert("crop", crop.to_string());
    }

    // Derived fields
    if let Some((w, h)) = validation.and_then(ValidationResult::dimensions) {
        fields.insert("_w", w.to_string());
        fields.insert("_h", h.to_string());
    }
    if let Some(metadata) = metadata {
        if let Some(etag) = &metadata.etag {
            fields.insert("_etag", urlencoding::encode(etag).into_owned());
        }
        if let Some(ts) = metadata.last_modified {
            fields.insert("_ts", ts.to_string());
        }
    }

    let scope = format!("{}:{}", FINGERPRINT_PREFIX, key);
    if fields.is_empty() {
        return Fingerprint(scope);
    }

    let query = fields
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    let full = format!("{}?{}", scope, query);
    if full.len() > MAX_FINGERPRINT_LENGTH {
        hash_long_fingerprint(&scope, &query)
    } else {
        Fingerprint(full)
    }
}

/// Fingerprint known before the object is fetched: no dimensions, no metadata
pub fn identity_fingerprint(key: &str, spec: &TransformSpec) -> Fingerprint {
    build_fingerprint(key, spec, None, None)
}

fn hash_long_fingerprint(scope: &str, query: &str) -> Fingerprint {
    let digest = Sha256::digest(query.as_bytes());
    Fingerprint(format!("{}#sha256:{}", scope, hex::encode(digest)))
}
