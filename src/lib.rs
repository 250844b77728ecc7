//! # sliding-fec
//!
//! Sliding-window forward error correction over a stream of application
//! payloads ("sources"), for lossy datagram channels. An encoder admits
//! sources, periodically emitting a "repair" packet holding a linear
//! combination over a Galois field; a decoder reconstructs missing sources
//! from repairs and partial arrivals, with no retransmission, and reports
//! feedback to the encoder via "ack" packets.
//!
//! ## Crate structure
//!
//! - [`gf`] — Galois field arithmetic, GF(2^m) for m ∈ {4, 8, 16, 32}
//! - [`coeff`] — deterministic repair coefficient derivation
//! - [`symbol`] — 16-byte-aligned symbol buffers
//! - [`source`] — `Source`, `Repair`, `Ack`, and their ordered containers
//! - [`wire`] — packet framing (source/repair/ack) to and from bytes
//! - [`config`] — encoder/decoder configuration
//! - [`error`] — codec error taxonomy
//! - [`stats`] — per-side counters and the adaptive-rate EWMA
//! - [`encoder`] — sender-side: admission, window, repair generation, acks
//! - [`decoder`] — receiver-side: intake, Gaussian elimination, delivery, acks

pub mod coeff;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gf;
pub mod source;
pub mod stats;
pub mod symbol;
pub mod wire;

pub use config::{CodeType, DecoderConfig, EncoderConfig};
pub use decoder::{Decoder, DecoderCore};
pub use encoder::{Encoder, EncoderCore};
pub use error::{CodecError, ErrorCode};
pub use gf::GaloisField;
pub use source::{Ack, Repair, Source};
