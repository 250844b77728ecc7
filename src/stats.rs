//! Codec statistics and the EWMA loss estimator driving adaptive rate.

use serde::Serialize;

// ─── Encoder Stats ──────────────────────────────────────────────────────────

/// Aggregate encoder-side counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EncoderStats {
    /// Sources admitted.
    pub nb_admitted_sources: u64,
    /// Source packets emitted (systematic mode only).
    pub nb_sent_sources: u64,
    /// Repair packets emitted.
    pub nb_sent_repairs: u64,
    /// Sources evicted from the window before being acked.
    pub nb_window_evictions: u64,
    /// Acks received from the decoder.
    pub nb_received_acks: u64,
    /// Current effective rate (post-adaptation).
    pub effective_rate: usize,
}

// ─── Decoder Stats ──────────────────────────────────────────────────────────

/// Aggregate decoder-side counters, named directly after the spec's §4.5/§6 counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecoderStats {
    /// Sources received directly (not reconstructed).
    pub nb_received_sources: u64,
    /// Repair packets received.
    pub nb_received_repairs: u64,
    /// Sources reconstructed via repair decoding.
    pub nb_decoded: u64,
    /// Repairs dropped because every referenced source was already known.
    pub nb_useless_repairs: u64,
    /// Full-decode (Gaussian elimination) attempts that failed due to rank deficiency.
    pub nb_failed_full_decodings: u64,
    /// Acks emitted to the encoder.
    pub nb_sent_acks: u64,
    /// Sources currently known missing (referenced by a retained repair, not yet decoded).
    pub nb_missing_sources: u64,
}

// ─── EWMA ───────────────────────────────────────────────────────────────────

/// Exponentially weighted moving average, used here to smooth the observed
/// per-ack loss rate feeding the adaptive rate estimator.
#[derive(Debug, Clone)]
pub struct Ewma {
    /// Smoothing factor (0.0 - 1.0). Higher = more responsive.
    alpha: f64,
    /// Current smoothed value.
    value: f64,
    /// Whether the first sample has been applied.
    initialized: bool,
}

impl Ewma {
    /// Create a new EWMA with the given smoothing factor.
    pub fn new(alpha: f64) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "alpha must be in [0, 1]");
        Ewma {
            alpha,
            value: 0.0,
            initialized: false,
        }
    }

    /// Update with a new sample and return the smoothed value.
    pub fn update(&mut self, sample: f64) -> f64 {
        if !self.initialized {
            self.value = sample;
            self.initialized = true;
        } else {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    /// Get the current smoothed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Reset to uninitialized state.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_first_sample_sets_value() {
        let mut ewma = Ewma::new(0.25);
        ewma.update(1.0);
        assert_eq!(ewma.value(), 1.0);
    }

    #[test]
    fn ewma_smooths_toward_new_value() {
        let mut ewma = Ewma::new(0.25);
        ewma.update(0.0);
        let v = ewma.update(1.0);
        assert!((v - 0.25).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn ewma_reset() {
        let mut ewma = Ewma::new(0.25);
        ewma.update(1.0);
        ewma.reset();
        assert_eq!(ewma.value(), 0.0);
    }

    #[test]
    fn encoder_stats_serializes() {
        let stats = EncoderStats {
            nb_admitted_sources: 10,
            nb_sent_sources: 10,
            nb_sent_repairs: 2,
            nb_window_evictions: 0,
            nb_received_acks: 1,
            effective_rate: 5,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"nb_decoded\"") == false); // encoder stats have no decode counter
        assert!(json.contains("\"nb_sent_repairs\":2"));
    }

    #[test]
    fn decoder_stats_default_is_zeroed() {
        let stats = DecoderStats::default();
        assert_eq!(stats.nb_decoded, 0);
        assert_eq!(stats.nb_missing_sources, 0);
    }
}
