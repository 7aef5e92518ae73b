//! Output format negotiation based on the Accept header
//!
//! Preference is fixed rather than q-value driven: the newest format the
//! client advertises wins.

use super::params::OutputFormat;

/// Formats probed in order, most efficient first
const NEGOTIATION_ORDER: [(&str, OutputFormat); 4] = [
    ("image/jxl", OutputFormat::Jxl),
    ("image/avif", OutputFormat::Avif),
    ("image/webp", OutputFormat::WebP),
    ("image/jpeg", OutputFormat::Jpeg),
];

/// Pick the output format for a client capability hint
///
/// Matching is a case-insensitive substring test. Without a match (or
/// without a header) the answer is PNG, which every client decodes.
pub fn negotiate_format(accept: Option<&str>) -> OutputFormat {
    let Some(accept) = accept else {
        return OutputFormat::Png;
    };
    let accept = accept.to_ascii_lowercase();

    NEGOTIATION_ORDER
        .iter()
        .find(|(media_type, _)| accept.contains(media_type))
        .map(|(_, format)| *format)
        .unwrap_or(OutputFormat::Png)
}

/// Resolve the final output format: an explicit request beats negotiation
pub fn resolve_format(requested: Option<OutputFormat>, accept: Option<&str>) -> OutputFormat {
    requested.unwrap_or_else(|| negotiate_format(accept))
}

/// Vary header value for negotiated responses
pub fn vary_header() -> &'static str {
    "Accept"
}
