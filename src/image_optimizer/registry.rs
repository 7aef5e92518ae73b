//! Lazy codec module initialisation
//!
//! Each encoder backend is brought up on first use with a one-pixel self test.
//! The outcome is recorded per codec, so later calls are a table lookup and a
//! failing codec keeps failing the same way instead of retrying on every
//! request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::error::ImageError;

/// Codec backends managed by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Mozjpeg,
    Oxipng,
    WebP,
    Avif,
    JpegXl,
    /// AV1 decoder behind AVIF sources
    Rav1d,
    /// JPEG XL decoder
    JxlOxide,
}

impl Codec {
    pub const ALL: [Codec; 7] = [
        Codec::Mozjpeg,
        Codec::Oxipng,
        Codec::WebP,
        Codec::Avif,
        Codec::JpegXl,
        Codec::Rav1d,
        Codec::JxlOxide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Mozjpeg => "mozjpeg",
            Codec::Oxipng => "oxipng",
            Codec::WebP => "webp",
            Codec::Avif => "avif",
            Codec::JpegXl => "jxl",
            Codec::Rav1d => "rav1d",
            Codec::JxlOxide => "jxl-oxide",
        }
    }
}

/// Initialisation state of one codec module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecState {
    Ready,
    Failed(String),
}

type InitFn = fn(Codec) -> Result<(), String>;

/// Per-codec initialisation table
pub struct CodecRegistry {
    states: RwLock<HashMap<Codec, CodecState>>,
    init: InitFn,
    init_runs: AtomicU64,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::with_initializer(self_test)
    }

    /// Registry with a custom initialiser (used to simulate broken codecs)
    pub fn with_initializer(init: InitFn) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            init,
            init_runs: AtomicU64::new(0),
        }
    }

    /// Make sure `codec` is initialised, running its initialiser at most once
    pub fn ensure(&self, codec: Codec) -> Result<(), ImageError> {
        if let Some(state) = self.states.read().get(&codec) {
            return state_to_result(codec, state);
        }

        let mut states = self.states.write();
        // Another caller may have won the race for the write lock
        if let Some(state) = states.get(&codec) {
            return state_to_result(codec, state);
        }

        self.init_runs.fetch_add(1, Ordering::Relaxed);
        let state = match (self.init)(codec) {
            Ok(()) => {
                debug!(codec = codec.as_str(), "Codec initialised");
                CodecState::Ready
            }
            Err(message) => {
                warn!(codec = codec.as_str(), error = %message, "Codec initialisation failed");
                CodecState::Failed(message)
            }
        };
        let result = state_to_result(codec, &state);
        states.insert(codec, state);
        result
    }

    /// Current state, `None` if never requested
    pub fn state(&self, codec: Codec) -> Option<CodecState> {
        self.states.read().get(&codec).cloned()
    }

    /// Number of initialiser invocations so far
    pub fn init_runs(&self) -> u64 {
        self.init_runs.load(Ordering::Relaxed)
    }
}

fn state_to_result(codec: Codec, state: &CodecState) -> Result<(), ImageError> {
    match state {
        CodecState::Ready => Ok(()),
        CodecState::Failed(message) => Err(ImageError::codec_unavailable(codec.as_str(), message)),
    }
}

/// Encode a single opaque pixel with the codec, or decode one for decoders
fn self_test(codec: Codec) -> Result<(), String> {
    use super::engine::{av1, codec};

    let pixel = [255u8, 255, 255, 255];
    let output = match codec {
        Codec::Mozjpeg => codec::encode_mozjpeg(&pixel[..3], 1, 1, 90),
        Codec::Oxipng => codec::encode_png(&pixel, 1, 1, Some(1)),
        Codec::WebP => codec::encode_webp_lossy(&pixel, 1, 1, 90),
        Codec::Avif => codec::encode_avif(&pixel, 1, 1, 90),
        Codec::JpegXl => codec::encode_jxl(&pixel, 1, 1),
        Codec::Rav1d => {
            let avif = codec::encode_avif(&pixel, 1, 1, 90).map_err(|e| e.to_string())?;
            return decoded_one_pixel(av1::decode_avif(&avif));
        }
        Codec::JxlOxide => {
            let jxl = codec::encode_jxl(&pixel, 1, 1).map_err(|e| e.to_string())?;
            return decoded_one_pixel(codec::decode_jxl(&jxl));
        }
    }
    .map_err(|e| e.to_string())?;

    if output.is_empty() {
        return Err("self test produced no output".to_string());
    }
    Ok(())
}

fn decoded_one_pixel(result: Result<image::DynamicImage, ImageError>) -> Result<(), String> {
    let image = result.map_err(|e| e.to_string())?;
    if (image.width(), image.height()) != (1, 1) {
        return Err("self test decoded the wrong size".to_string());
    }
    Ok(())
}
