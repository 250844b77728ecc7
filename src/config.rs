//! Codec configuration, defaults taken from the original `ntc::configuration`.

use std::time::Duration;

/// Whether the encoder transmits sources verbatim in addition to repairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    /// Each admitted source is sent as-is, then repairs follow.
    Systematic,
    /// Only repairs are ever sent; sources are never transmitted directly.
    NonSystematic,
}

/// Encoder-side configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Galois field size, one of 4, 8, 16, 32.
    pub galois_field_size: u8,
    /// Systematic or non-systematic coding.
    pub code_type: CodeType,
    /// Sources admitted between repair generations.
    pub rate: usize,
    /// Maximum number of sources retained in the encoder window.
    pub window_size: usize,
    /// Whether the effective rate adapts to observed loss via acks.
    pub adaptive: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            galois_field_size: 8,
            code_type: CodeType::Systematic,
            rate: 5,
            window_size: usize::MAX,
            adaptive: true,
        }
    }
}

/// Decoder-side configuration.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Galois field size, one of 4, 8, 16, 32. Must match the encoder's.
    pub galois_field_size: u8,
    /// Deliver sources strictly in ascending id order.
    pub in_order: bool,
    /// Frequency at which acks are sent automatically; `Duration::ZERO` disables.
    pub ack_frequency: Duration,
    /// Ack after this many sources+repairs received, regardless of `ack_frequency`.
    pub ack_nb_packets: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            galois_field_size: 8,
            in_order: true,
            ack_frequency: Duration::from_millis(100),
            ack_nb_packets: 50,
        }
    }
}
