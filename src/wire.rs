//! Wire framing: serializes/deserializes source, repair and ack packets.
//!
//! Replaces the teacher's QUIC-style VarInt + control-subtype framing with
//! the fixed-width tables this codec's wire format specifies. Every `read_*`
//! returns the parsed value plus the number of bytes consumed, and surfaces
//! `PacketTypeError`/`Overflow` through `Result` rather than silently
//! returning `None`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::gf::GaloisField;
use crate::source::{Ack, Repair, Source, SourceIdList};
use crate::symbol::SymbolBuffer;

/// The packet type tag occupying the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Source = 0x01,
    Repair = 0x02,
    Ack = 0x03,
}

impl PacketType {
    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0x01 => Ok(PacketType::Source),
            0x02 => Ok(PacketType::Repair),
            0x03 => Ok(PacketType::Ack),
            _ => Err(CodecError::PacketTypeError),
        }
    }
}

/// Peek at a buffer's packet type tag without consuming it.
pub fn peek_packet_type(buf: &[u8]) -> Result<PacketType, CodecError> {
    let tag = *buf.first().ok_or(CodecError::Overflow {
        needed: 1,
        available: 0,
    })?;
    PacketType::from_tag(tag)
}

fn need(buf: &[u8], at: usize, len: usize) -> Result<(), CodecError> {
    if at + len > buf.len() {
        Err(CodecError::Overflow {
            needed: at + len,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Stateless encode/decode routines for the three wire packet kinds.
pub struct Packetizer;

impl Packetizer {
    // ─── source ────────────────────────────────────────────────────────

    pub fn write_source(source: &Source) -> Bytes {
        let symbol = source.symbol.as_slice();
        let mut buf = BytesMut::with_capacity(1 + 4 + 2 + 2 + symbol.len());
        buf.put_u8(PacketType::Source as u8);
        buf.put_u32(source.id);
        buf.put_u16(symbol.len() as u16);
        buf.put_u16(source.user_size);
        buf.put_slice(symbol);
        buf.freeze()
    }

    /// Parse a source packet. Returns the source and the number of bytes consumed.
    pub fn read_source(buf: &[u8]) -> Result<(Source, usize), CodecError> {
        need(buf, 0, 1)?;
        if PacketType::from_tag(buf[0])? != PacketType::Source {
            return Err(CodecError::PacketTypeError);
        }
        need(buf, 1, 4 + 2 + 2)?;
        let mut cur = &buf[1..];
        let id = cur.get_u32();
        let symbol_len = cur.get_u16() as usize;
        let user_size = cur.get_u16();
        let header_len = 1 + 4 + 2 + 2;
        need(buf, header_len, symbol_len)?;
        let symbol = SymbolBuffer::from_slice(&buf[header_len..header_len + symbol_len]);
        Ok((Source::new(id, symbol, user_size), header_len + symbol_len))
    }

    // ─── repair ────────────────────────────────────────────────────────

    pub fn write_repair(repair: &Repair, field: &GaloisField) -> Bytes {
        let ids = repair.source_ids.as_slice();
        let symbol = repair.encoded_symbol.as_slice();
        let width = field.element_wire_width();
        let mut buf = BytesMut::with_capacity(
            1 + 4 + 2 + 4 * ids.len() + 1 + width as usize + 2 + symbol.len(),
        );
        buf.put_u8(PacketType::Repair as u8);
        buf.put_u32(repair.id);
        buf.put_u16(ids.len() as u16);
        for &id in ids {
            buf.put_u32(id);
        }
        buf.put_u8(width);
        put_field_element(&mut buf, repair.encoded_user_size, width);
        buf.put_u16(symbol.len() as u16);
        buf.put_slice(symbol);
        buf.freeze()
    }

    pub fn read_repair(buf: &[u8], field: &GaloisField) -> Result<(Repair, usize), CodecError> {
        need(buf, 0, 1)?;
        if PacketType::from_tag(buf[0])? != PacketType::Repair {
            return Err(CodecError::PacketTypeError);
        }
        need(buf, 1, 4 + 2)?;
        let mut cur = &buf[1..1 + 4 + 2];
        let id = cur.get_u32();
        let nb_ids = cur.get_u16() as usize;
        let mut offset = 1 + 4 + 2;
        need(buf, offset, 4 * nb_ids)?;
        let mut ids = Vec::with_capacity(nb_ids);
        for i in 0..nb_ids {
            let at = offset + i * 4;
            ids.push((&buf[at..at + 4]).get_u32());
        }
        offset += 4 * nb_ids;

        need(buf, offset, 1)?;
        let width = buf[offset];
        offset += 1;
        if width != field.element_wire_width() {
            return Err(CodecError::InvalidArgument(format!(
                "repair's encoded_user_size_width {width} does not match configured field width {}",
                field.element_wire_width()
            )));
        }
        need(buf, offset, width as usize)?;
        let encoded_user_size = get_field_element(&buf[offset..offset + width as usize], width);
        offset += width as usize;

        need(buf, offset, 2)?;
        let symbol_len = (&buf[offset..offset + 2]).get_u16() as usize;
        offset += 2;
        need(buf, offset, symbol_len)?;
        let encoded_symbol = SymbolBuffer::from_slice(&buf[offset..offset + symbol_len]);
        offset += symbol_len;

        Ok((
            Repair {
                id,
                source_ids: SourceIdList::from_sorted(ids),
                encoded_symbol,
                encoded_user_size,
            },
            offset,
        ))
    }

    // ─── ack ───────────────────────────────────────────────────────────

    pub fn write_ack(ack: &Ack) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 2 + 4 * ack.source_ids.len() + 2);
        buf.put_u8(PacketType::Ack as u8);
        buf.put_u16(ack.source_ids.len() as u16);
        for &id in &ack.source_ids {
            buf.put_u32(id);
        }
        buf.put_u16(ack.nb_packets);
        buf.freeze()
    }

    pub fn read_ack(buf: &[u8]) -> Result<(Ack, usize), CodecError> {
        need(buf, 0, 1)?;
        if PacketType::from_tag(buf[0])? != PacketType::Ack {
            return Err(CodecError::PacketTypeError);
        }
        need(buf, 1, 2)?;
        let nb_ids = (&buf[1..3]).get_u16() as usize;
        let mut offset = 3;
        need(buf, offset, 4 * nb_ids)?;
        let mut ids = Vec::with_capacity(nb_ids);
        for i in 0..nb_ids {
            let at = offset + i * 4;
            ids.push((&buf[at..at + 4]).get_u32());
        }
        offset += 4 * nb_ids;
        need(buf, offset, 2)?;
        let nb_packets = (&buf[offset..offset + 2]).get_u16();
        offset += 2;
        Ok((
            Ack {
                source_ids: ids,
                nb_packets,
            },
            offset,
        ))
    }
}

fn put_field_element(buf: &mut BytesMut, value: u32, width: u8) {
    match width {
        1 => buf.put_u8(value as u8),
        2 => buf.put_u16(value as u16),
        4 => buf.put_u32(value),
        _ => unreachable!("field element width is always 1, 2 or 4"),
    }
}

fn get_field_element(buf: &[u8], width: u8) -> u32 {
    match width {
        1 => buf[0] as u32,
        2 => u16::from_be_bytes([buf[0], buf[1]]) as u32,
        4 => u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
        _ => unreachable!("field element width is always 1, 2 or 4"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrip() {
        let source = Source::new(42, SymbolBuffer::from_slice(b"abcd"), 4);
        let bytes = Packetizer::write_source(&source);
        let (parsed, consumed) = Packetizer::read_source(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.id, 42);
        assert_eq!(parsed.user_size, 4);
        assert_eq!(parsed.symbol.as_slice(), source.symbol.as_slice());
    }

    #[test]
    fn repair_roundtrip() {
        let field = GaloisField::Gf256;
        let repair = Repair {
            id: 7,
            source_ids: SourceIdList::from_sorted(vec![1, 2, 3]),
            encoded_symbol: SymbolBuffer::from_slice(b"xyz0"),
            encoded_user_size: 9,
        };
        let bytes = Packetizer::write_repair(&repair, &field);
        let (parsed, consumed) = Packetizer::read_repair(&bytes, &field).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.source_ids.as_slice(), &[1, 2, 3]);
        assert_eq!(parsed.encoded_user_size, 9);
    }

    #[test]
    fn repair_rejects_mismatched_field_width() {
        let repair = Repair {
            id: 1,
            source_ids: SourceIdList::from_sorted(vec![1]),
            encoded_symbol: SymbolBuffer::from_slice(b"abcd"),
            encoded_user_size: 1,
        };
        let bytes = Packetizer::write_repair(&repair, &GaloisField::Gf64K);
        let err = Packetizer::read_repair(&bytes, &GaloisField::Gf256).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
    }

    #[test]
    fn ack_roundtrip() {
        let ack = Ack {
            source_ids: vec![1, 2, 3, 4],
            nb_packets: 10,
        };
        let bytes = Packetizer::write_ack(&ack);
        let (parsed, consumed) = Packetizer::read_ack(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.source_ids, vec![1, 2, 3, 4]);
        assert_eq!(parsed.nb_packets, 10);
    }

    #[test]
    fn truncated_source_is_overflow() {
        let source = Source::new(1, SymbolBuffer::from_slice(b"abcd"), 4);
        let bytes = Packetizer::write_source(&source);
        let err = Packetizer::read_source(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { .. }));
    }

    #[test]
    fn ack_fed_as_source_is_packet_type_error() {
        let ack = Ack {
            source_ids: vec![1],
            nb_packets: 1,
        };
        let bytes = Packetizer::write_ack(&ack);
        let err = Packetizer::read_source(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::PacketTypeError));
    }

    #[test]
    fn garbage_bytes_are_packet_type_error() {
        let err = peek_packet_type(&[0xFF, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::PacketTypeError));
    }

    #[test]
    fn empty_buffer_is_overflow() {
        let err = peek_packet_type(&[]).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { .. }));
    }
}
