//! Sender-side: source admission, window management, repair generation,
//! adaptive rate, and ack processing.

use crate::coeff::coefficient;
use crate::config::{CodeType, EncoderConfig};
use crate::error::CodecError;
use crate::gf::GaloisField;
use crate::source::{Ack, Repair, Source, SourceList};
use crate::stats::{EncoderStats, Ewma};
use crate::symbol::SymbolBuffer;
use crate::wire::Packetizer;

/// EWMA smoothing factor for the adaptive rate estimator (§9 Design Notes).
const ADAPTIVE_ALPHA: f64 = 0.25;

/// The encoder's core algorithm, independent of how bytes reach the wire.
///
/// Grounded on the teacher's `RlncEncoder` (window-as-ordered-container,
/// eviction-on-overflow, repair-generation loop) generalized to an
/// arbitrary Galois field and the spec's deterministic coefficients.
pub struct EncoderCore {
    field: GaloisField,
    code_type: CodeType,
    window: SourceList,
    window_size: usize,
    rate: usize,
    effective_rate: f64,
    adaptive: bool,
    current_source_id: u32,
    current_repair_id: u32,
    since_repair: usize,
    sent_since_last_ack: u64,
    loss_ewma: Ewma,
    stats: EncoderStats,
}

impl EncoderCore {
    pub fn new(config: &EncoderConfig) -> Result<Self, CodecError> {
        let field = GaloisField::from_size(config.galois_field_size)?;
        Ok(EncoderCore {
            field,
            code_type: config.code_type,
            window: SourceList::new(),
            window_size: config.window_size,
            rate: config.rate.max(1),
            effective_rate: config.rate.max(1) as f64,
            adaptive: config.adaptive,
            current_source_id: 0,
            current_repair_id: 0,
            since_repair: 0,
            sent_since_last_ack: 0,
            loss_ewma: Ewma::new(ADAPTIVE_ALPHA),
            stats: EncoderStats {
                effective_rate: config.rate.max(1),
                ..Default::default()
            },
        })
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Admit a new application payload. `emit` receives every wire packet
    /// produced as a side effect (the source packet itself, if systematic,
    /// and a repair packet once the rate threshold is reached).
    pub fn admit(
        &mut self,
        payload: &[u8],
        emit: &mut dyn FnMut(&[u8]),
    ) -> Result<(), CodecError> {
        if payload.len() % self.alignment_requirement() != 0 {
            return Err(CodecError::InvalidLength {
                len: payload.len(),
                field_width: self.field.bits(),
            });
        }

        let id = self.current_source_id;
        self.current_source_id = self.current_source_id.wrapping_add(1);
        let symbol = SymbolBuffer::from_slice(payload);
        let user_size = payload.len() as u16;
        let source = Source::new(id, symbol, user_size);

        if self.code_type == CodeType::Systematic {
            let bytes = Packetizer::write_source(&source);
            emit(&bytes);
            self.stats.nb_sent_sources += 1;
            self.sent_since_last_ack += 1;
        }

        self.window.insert(source);
        self.stats.nb_admitted_sources += 1;
        while self.window.len() > self.window_size {
            self.window.pop_first();
            self.stats.nb_window_evictions += 1;
        }

        self.since_repair += 1;
        let threshold = self.effective_rate.round().max(1.0) as usize;
        if self.since_repair >= threshold {
            let n = threshold.min(self.window.len());
            // Systematic mode already carries every source verbatim, so one
            // repair per block is enough to patch a single loss. Non-systematic
            // mode has no such side channel: losing any one of the block's only
            // repair leaves its N sources entirely unrecoverable (rank 1 over N
            // unknowns), so emit N+1 independent combinations per block — full
            // rank survives the loss of any single repair (spec.md §8 scenario 6).
            let repeats = match self.code_type {
                CodeType::Systematic => 1,
                CodeType::NonSystematic => n + 1,
            };
            for _ in 0..repeats {
                self.generate_repair(emit);
            }
            self.since_repair = 0;
        }

        Ok(())
    }

    /// Emit a repair covering the last `min(effective_rate, window.len())` admitted sources.
    pub fn generate_repair(&mut self, emit: &mut dyn FnMut(&[u8])) {
        if self.window.is_empty() {
            return;
        }
        let n = (self.effective_rate.round().max(1.0) as usize).min(self.window.len());
        let all_ids: Vec<u32> = self.window.ids().collect();
        let selected = &all_ids[all_ids.len() - n..];

        let repair_id = self.current_repair_id;
        self.current_repair_id = self.current_repair_id.wrapping_add(1);

        let max_len = selected
            .iter()
            .map(|id| self.window.get(*id).unwrap().symbol.len())
            .max()
            .unwrap_or(0);

        let mut encoded_symbol = SymbolBuffer::zeroed(max_len);
        let mut encoded_user_size: u32 = 0;

        for &id in selected {
            let source = self.window.get(id).expect("selected id is in window");
            let coef = coefficient(&self.field, repair_id, id);
            self.field
                .multiply_add(
                    encoded_symbol.as_mut_slice(),
                    coef,
                    source.symbol.as_slice(),
                )
                .expect("encoder symbols are always field-aligned");
            encoded_user_size ^= self.field.mul(coef, source.user_size as u32);
        }

        let repair = Repair {
            id: repair_id,
            source_ids: crate::source::SourceIdList::from_sorted(selected.to_vec()),
            encoded_symbol,
            encoded_user_size,
        };
        let bytes = Packetizer::write_repair(&repair, &self.field);
        emit(&bytes);
        self.stats.nb_sent_repairs += 1;
        self.sent_since_last_ack += 1;
    }

    /// Process a received ack: evict acknowledged sources from the window
    /// and, if adaptive, adjust the effective repair rate from observed loss.
    pub fn on_ack(&mut self, ack: &Ack) {
        for &id in &ack.source_ids {
            self.window.remove(id);
        }
        self.stats.nb_received_acks += 1;

        if self.adaptive && self.sent_since_last_ack > 0 {
            let received = ack.nb_packets as f64;
            let sent = self.sent_since_last_ack as f64;
            let loss = (1.0 - (received / sent)).clamp(0.0, 1.0);
            let smoothed = self.loss_ewma.update(loss);
            // loss 0 -> rate (minimum redundancy); loss 1 -> 1 (maximum redundancy).
            self.effective_rate = (self.rate as f64 - (self.rate as f64 - 1.0) * smoothed)
                .clamp(1.0, self.rate as f64);
            self.stats.effective_rate = self.effective_rate.round() as usize;
        }
        self.sent_since_last_ack = 0;
    }

    fn alignment_requirement(&self) -> usize {
        match self.field.bits() {
            16 => 2,
            32 => 4,
            _ => 1,
        }
    }
}

/// The public encoder: wires [`EncoderCore`] to a user-supplied emit callback.
pub struct Encoder<F: FnMut(&[u8])> {
    core: EncoderCore,
    emit: F,
}

impl<F: FnMut(&[u8])> Encoder<F> {
    pub fn new(config: EncoderConfig, emit: F) -> Result<Self, CodecError> {
        Ok(Encoder {
            core: EncoderCore::new(&config)?,
            emit,
        })
    }

    /// Admit a new application payload for transmission.
    pub fn admit(&mut self, payload: &[u8]) -> Result<(), CodecError> {
        self.core.admit(payload, &mut self.emit)
    }

    /// Feed an incoming packet (expected: an ack). Returns bytes consumed.
    pub fn on_incoming_packet(&mut self, packet: &[u8]) -> Result<usize, CodecError> {
        match crate::wire::peek_packet_type(packet)? {
            crate::wire::PacketType::Ack => {
                let (ack, consumed) = Packetizer::read_ack(packet)?;
                self.core.on_ack(&ack);
                Ok(consumed)
            }
            _ => Err(CodecError::PacketTypeError),
        }
    }

    pub fn window_size(&self) -> usize {
        self.core.window_len()
    }

    pub fn stats(&self) -> &EncoderStats {
        self.core.stats()
    }
}
