//! HTTP adapters for the external capabilities the core depends on.
//!
//! - [`gemini`]: image generation through the Gemini `generateContent` API.
//! - [`youtube`]: reference search through the YouTube Data API v3.
//! - [`fetch`]: plain HTTP download of reference image bytes.
//!
//! Request bodies and response parsing are pure functions so they can be
//! tested without the network.

pub mod fetch;
pub mod gemini;
pub mod youtube;

pub use fetch::HttpImageFetcher;
pub use gemini::GeminiGenerator;
pub use youtube::YouTubeSearch;
