//! Receiver-side: source/repair intake, incremental Gaussian elimination,
//! in-order delivery, and ack generation.

use std::collections::BTreeMap;
use std::time::Duration;

use quanta::Instant;

use crate::coeff::coefficient;
use crate::config::DecoderConfig;
use crate::error::CodecError;
use crate::gf::GaloisField;
use crate::source::{Ack, Repair, Source, SourceIdList, SourceList};
use crate::stats::DecoderStats;
use crate::symbol::SymbolBuffer;
use crate::wire::{PacketType, Packetizer};

/// The decoder's core algorithm, independent of how bytes arrive or how
/// decoded sources are delivered.
///
/// Grounded on the teacher's `RlncDecoder` (incremental reduction against
/// known sources, Gaussian elimination with partial pivoting) and on
/// `examples/original_source/netcode/decoder.hh`'s public facade shape
/// (`maybe_ack`/`generate_ack` semantics, counter names).
pub struct DecoderCore {
    field: GaloisField,
    in_order: bool,
    sources: SourceList,
    missing: SourceIdList,
    repairs: BTreeMap<u32, Repair>,
    last_delivered_id: Option<u32>,
    /// Largest "window floor" (smallest source id) observed across every
    /// repair ever seen. Since the encoder's window only ever advances
    /// forward, an id below this floor will never again be referenced by
    /// any repair — if it never arrived as a source either, it is gone
    /// for good and in-order delivery must skip past it rather than stall.
    window_floor: u32,
    ack: Ack,
    last_ack_time: Instant,
    ack_frequency: Duration,
    ack_nb_packets: usize,
    stats: DecoderStats,
}

impl DecoderCore {
    pub fn new(config: &DecoderConfig) -> Result<Self, CodecError> {
        let field = GaloisField::from_size(config.galois_field_size)?;
        Ok(DecoderCore {
            field,
            in_order: config.in_order,
            sources: SourceList::new(),
            missing: SourceIdList::new(),
            repairs: BTreeMap::new(),
            last_delivered_id: None,
            window_floor: 0,
            ack: Ack::new(),
            last_ack_time: Instant::now(),
            ack_frequency: config.ack_frequency,
            ack_nb_packets: config.ack_nb_packets,
            stats: DecoderStats::default(),
        })
    }

    pub fn stats(&self) -> DecoderStats {
        let mut s = self.stats.clone();
        s.nb_missing_sources = self.missing.len() as u64;
        s
    }

    // ─── source intake ───────────────────────────────────────────────

    pub fn on_source(&mut self, source: Source, deliver: &mut dyn FnMut(&[u8], u16)) {
        self.stats.nb_received_sources += 1;
        self.ack.nb_packets = self.ack.nb_packets.saturating_add(1);

        if self.in_order {
            if let Some(last) = self.last_delivered_id {
                if source.id <= last {
                    return;
                }
            }
        }
        if self.sources.contains(source.id) {
            return;
        }

        self.know_source(source);
        self.deliver(deliver);
    }

    // ─── repair intake ───────────────────────────────────────────────

    pub fn on_repair(&mut self, mut repair: Repair, deliver: &mut dyn FnMut(&[u8], u16)) {
        self.stats.nb_received_repairs += 1;
        self.ack.nb_packets = self.ack.nb_packets.saturating_add(1);

        if self.in_order {
            if let Some(last) = self.last_delivered_id {
                if repair.source_ids.max().map_or(true, |m| m <= last) {
                    return; // entirely outdated
                }
            }
        }

        if let Some(floor) = repair.source_ids.as_slice().first().copied() {
            self.window_floor = self.window_floor.max(floor);
        }

        let mut remaining = Vec::new();
        for id in repair.source_ids.iter() {
            if let Some(src) = self.sources.get(id) {
                let coef = coefficient(&self.field, repair.id, id);
                let _ = self.field.multiply_add(
                    repair.encoded_symbol.as_mut_slice(),
                    coef,
                    src.symbol.as_slice(),
                );
                repair.encoded_user_size ^= self.field.mul(coef, src.user_size as u32);
            } else {
                remaining.push(id);
                let already_delivered =
                    self.in_order && self.last_delivered_id.is_some_and(|l| id <= l);
                if !already_delivered {
                    self.missing.insert(id);
                }
            }
        }
        repair.source_ids = SourceIdList::from_sorted(remaining);

        if repair.source_ids.is_empty() {
            self.stats.nb_useless_repairs += 1;
            self.deliver(deliver);
            return;
        }

        if repair.source_ids.len() == 1 {
            let u = repair.source_ids.iter().next().unwrap();
            let decoded = self.decode_single(repair.id, u, &repair.encoded_symbol, repair.encoded_user_size);
            self.stats.nb_decoded += 1;
            self.know_source(decoded);
            self.deliver(deliver);
            return;
        }

        self.repairs.insert(repair.id, repair);
        self.try_full_decode();
        self.deliver(deliver);
    }

    /// Recover a source from a repair with exactly one remaining unknown id.
    fn decode_single(
        &self,
        repair_id: u32,
        source_id: u32,
        encoded_symbol: &SymbolBuffer,
        encoded_user_size: u32,
    ) -> Source {
        let coef = coefficient(&self.field, repair_id, source_id);
        let inv = self.field.inv(coef);
        let mut symbol = encoded_symbol.clone();
        let _ = self.field.scale(symbol.as_mut_slice(), inv);
        let user_size = self.field.mul(inv, encoded_user_size) as u16;
        Source::new(source_id, symbol, user_size)
    }

    /// Register `source` as known and propagate its contribution through
    /// every retained repair, cascading through any repair this reduces to
    /// a single remaining unknown (this is `drain()`: the cascade runs
    /// until no repair has exactly one remaining id).
    fn know_source(&mut self, source: Source) {
        let id = source.id;
        let symbol = source.symbol.clone();
        let user_size = source.user_size;
        self.sources.insert(source);
        self.missing.remove(id);

        let mut worklist = vec![(id, symbol, user_size)];
        while let Some((known_id, known_symbol, known_user_size)) = worklist.pop() {
            let affected: Vec<u32> = self
                .repairs
                .iter()
                .filter(|(_, r)| r.source_ids.contains(known_id))
                .map(|(rid, _)| *rid)
                .collect();

            for rid in affected {
                let mut newly_decoded = None;
                let mut drop_repair = false;

                if let Some(r) = self.repairs.get_mut(&rid) {
                    let coef = coefficient(&self.field, rid, known_id);
                    let _ = self.field.multiply_add(
                        r.encoded_symbol.as_mut_slice(),
                        coef,
                        known_symbol.as_slice(),
                    );
                    r.encoded_user_size ^= self.field.mul(coef, known_user_size as u32);
                    r.source_ids.remove(known_id);

                    if r.source_ids.is_empty() {
                        drop_repair = true;
                        self.stats.nb_useless_repairs += 1;
                    } else if r.source_ids.len() == 1 {
                        let u = r.source_ids.iter().next().unwrap();
                        drop_repair = true;
                        if !self.sources.contains(u) {
                            let decoded =
                                self.decode_single(rid, u, &r.encoded_symbol, r.encoded_user_size);
                            newly_decoded = Some(decoded);
                        }
                    }
                }

                if drop_repair {
                    self.repairs.remove(&rid);
                }
                if let Some(decoded) = newly_decoded {
                    self.stats.nb_decoded += 1;
                    let (nid, nsym, nuser) =
                        (decoded.id, decoded.symbol.clone(), decoded.user_size);
                    self.missing.remove(nid);
                    self.sources.insert(decoded);
                    worklist.push((nid, nsym, nuser));
                }
            }
        }
    }

    /// Full Gaussian elimination across every retained repair and every
    /// currently-missing id, triggered when a new repair is retained
    /// (§4.5 step 2.f). Only commits decoded sources on a full-rank system;
    /// on rank deficiency, state is left untouched.
    fn try_full_decode(&mut self) {
        if self.missing.len() < 2 || self.repairs.len() < self.missing.len() {
            return;
        }

        let cols: Vec<u32> = self.missing.iter().collect();
        let n = cols.len();
        let max_len = self
            .repairs
            .values()
            .map(|r| r.encoded_symbol.len())
            .max()
            .unwrap_or(0);

        struct Row {
            coeffs: Vec<u32>,
            data: SymbolBuffer,
            user: u32,
        }

        let mut rows: Vec<Row> = self
            .repairs
            .values()
            .map(|r| {
                let mut coeffs = vec![0u32; n];
                for (j, &col_id) in cols.iter().enumerate() {
                    if r.source_ids.contains(col_id) {
                        coeffs[j] = coefficient(&self.field, r.id, col_id);
                    }
                }
                let mut data = r.encoded_symbol.clone();
                data.resize(max_len);
                Row {
                    coeffs,
                    data,
                    user: r.encoded_user_size,
                }
            })
            .collect();

        for col in 0..n {
            let pivot = (col..rows.len()).find(|&i| rows[i].coeffs[col] != 0);
            let pivot = match pivot {
                Some(p) => p,
                None => {
                    self.stats.nb_failed_full_decodings += 1;
                    return;
                }
            };
            rows.swap(col, pivot);

            let inv = self.field.inv(rows[col].coeffs[col]);
            for c in col..n {
                rows[col].coeffs[c] = self.field.mul(rows[col].coeffs[c], inv);
            }
            let _ = self.field.scale(rows[col].data.as_mut_slice(), inv);
            rows[col].user = self.field.mul(rows[col].user, inv);

            for r in 0..rows.len() {
                if r == col {
                    continue;
                }
                let factor = rows[r].coeffs[col];
                if factor == 0 {
                    continue;
                }
                for c in col..n {
                    let sub = self.field.mul(factor, rows[col].coeffs[c]);
                    rows[r].coeffs[c] ^= sub;
                }
                let pivot_data = rows[col].data.clone();
                let _ = self
                    .field
                    .multiply_add(rows[r].data.as_mut_slice(), factor, pivot_data.as_slice());
                rows[r].user ^= self.field.mul(factor, rows[col].user);
            }
        }

        // Every row participated in solving for every missing id: the
        // whole retained-repair set is now fully spent.
        self.repairs.clear();
        for (col, &id) in cols.iter().enumerate() {
            let user_size = rows[col].user as u16;
            self.stats.nb_decoded += 1;
            self.missing.remove(id);
            self.sources
                .insert(Source::new(id, rows[col].data.clone(), user_size));
        }
    }

    // ─── delivery ──────────────────────────────────────────────────────

    fn deliver(&mut self, deliver_fn: &mut dyn FnMut(&[u8], u16)) {
        if self.in_order {
            loop {
                let next = self.last_delivered_id.map_or(0, |l| l + 1);
                match self.sources.remove(next) {
                    Some(src) => {
                        let bytes = src.symbol.to_bytes_truncated(src.user_size);
                        deliver_fn(&bytes, src.user_size);
                        self.last_delivered_id = Some(next);
                        self.ack.source_ids.push(next);
                    }
                    None if next < self.window_floor => {
                        // `next` predates every repair's current window and
                        // never arrived directly: the encoder will never
                        // reference it again. Skip past it rather than
                        // stall in-order delivery forever.
                        self.last_delivered_id = Some(next);
                    }
                    None => break,
                }
            }
        } else {
            let ids: Vec<u32> = self.sources.ids().collect();
            for id in ids {
                if let Some(src) = self.sources.remove(id) {
                    let bytes = src.symbol.to_bytes_truncated(src.user_size);
                    deliver_fn(&bytes, src.user_size);
                    self.last_delivered_id =
                        Some(self.last_delivered_id.map_or(id, |l| l.max(id)));
                    self.ack.source_ids.push(id);
                }
            }
        }

        if let Some(last) = self.last_delivered_id {
            let stale: Vec<u32> = self
                .repairs
                .iter()
                .filter(|(_, r)| r.source_ids.max().map_or(true, |m| m <= last))
                .map(|(rid, _)| *rid)
                .collect();
            for rid in stale {
                self.repairs.remove(&rid);
            }
        }
        self.recompute_missing();
    }

    /// Rebuild `missing` from scratch as the union of ids referenced by
    /// retained repairs that are neither already known nor already past
    /// `last_delivered_id` — the invariant incremental updates around
    /// repair eviction and window-floor skips are too easy to miss a case
    /// for.
    fn recompute_missing(&mut self) {
        let last = self.last_delivered_id;
        let mut ids: Vec<u32> = Vec::new();
        for r in self.repairs.values() {
            for id in r.source_ids.iter() {
                if !self.sources.contains(id) && last.map_or(true, |l| id > l) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        self.missing = SourceIdList::from_sorted(ids);
    }

    // ─── ack ─────────────────────────────────────────────────────────

    /// Force an ack to be emitted immediately.
    pub fn generate_ack(&mut self, emit: &mut dyn FnMut(&[u8])) {
        for id in self.sources.ids() {
            if !self.ack.source_ids.contains(&id) {
                self.ack.source_ids.push(id);
            }
        }
        let bytes = Packetizer::write_ack(&self.ack);
        emit(&bytes);
        self.stats.nb_sent_acks += 1;
        self.ack.reset();
    }

    /// Emit an ack if the packet-count or time threshold has been reached.
    pub fn maybe_ack(&mut self, emit: &mut dyn FnMut(&[u8])) {
        if self.ack.nb_packets as usize >= self.ack_nb_packets {
            self.generate_ack(emit);
            self.last_ack_time = Instant::now();
        } else if self.ack_frequency != Duration::ZERO
            && self.last_ack_time.elapsed() >= self.ack_frequency
        {
            self.generate_ack(emit);
            self.last_ack_time = Instant::now();
        }
    }
}

/// The public decoder: wires [`DecoderCore`] to user-supplied emit/deliver callbacks.
pub struct Decoder<E: FnMut(&[u8]), D: FnMut(&[u8], u16)> {
    core: DecoderCore,
    emit: E,
    deliver: D,
}

impl<E: FnMut(&[u8]), D: FnMut(&[u8], u16)> Decoder<E, D> {
    pub fn new(config: DecoderConfig, emit: E, deliver: D) -> Result<Self, CodecError> {
        Ok(Decoder {
            core: DecoderCore::new(&config)?,
            emit,
            deliver,
        })
    }

    /// Feed an incoming packet (source or repair). Returns bytes consumed.
    pub fn on_incoming_packet(&mut self, packet: &[u8]) -> Result<usize, CodecError> {
        let consumed = match crate::wire::peek_packet_type(packet)? {
            PacketType::Source => {
                let (source, consumed) = Packetizer::read_source(packet)?;
                self.core.on_source(source, &mut self.deliver);
                consumed
            }
            PacketType::Repair => {
                let (repair, consumed) = Packetizer::read_repair(packet, &self.core.field)?;
                self.core.on_repair(repair, &mut self.deliver);
                consumed
            }
            PacketType::Ack => return Err(CodecError::PacketTypeError),
        };
        self.core.maybe_ack(&mut self.emit);
        Ok(consumed)
    }

    pub fn generate_ack(&mut self) {
        self.core.generate_ack(&mut self.emit);
    }

    pub fn maybe_ack(&mut self) {
        self.core.maybe_ack(&mut self.emit);
    }

    pub fn stats(&self) -> DecoderStats {
        self.core.stats()
    }
}
