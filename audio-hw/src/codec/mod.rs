//! Codec families.
//!
//! Each family implements [`CodecOps`](crate::control::CodecOps) for one
//! register framing and ships the small bring-up sequence the driver needs
//! around stream start and frame-error recovery. Mixer, gain and routing
//! controls beyond that sequence are left to the application, which can
//! issue further writes through the same control bus.
//!
//! # Feature gates
//!
//! | Feature | Default | Family |
//! |---------|---------|--------|
//! | `wm8731` | yes | [`Wm8731`]: 7-bit index, 9-bit value |
//! | `cs4270` | yes | [`Cs4270`]: 8-bit map byte, 8-bit value |

#[cfg(feature = "wm8731")]
mod wm8731;
#[cfg(feature = "cs4270")]
mod cs4270;

#[cfg(feature = "wm8731")]
pub use wm8731::Wm8731;
#[cfg(feature = "cs4270")]
pub use cs4270::Cs4270;
