//! Parsed view of a single 188-byte transport packet.

use bytes::Bytes;

use crate::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};

/// Header and adaptation fields the analyzer and demux care about.
/// PCR is the full 27 MHz value (base * 300 + extension); PTS is the raw
/// 33-bit 90 kHz value. Both only record presence and value, no rescaling.
#[derive(Clone)]
pub struct TsPacket {
    pub pid: u16,
    pub payload_unit_start: bool,
    pub transport_error: bool,
    pub scrambling: u8,
    pub continuity_counter: u8,
    pub has_payload: bool,
    pub discontinuity: bool,
    pub pcr: Option<u64>,
    pub pts: Option<u64>,
    pub payload: Bytes,
}

impl TsPacket {
    pub fn parse(chunk: &[u8]) -> anyhow::Result<Self> {
        if chunk.len() < TS_PACKET_SIZE {
            anyhow::bail!("short packet ({} bytes)", chunk.len());
        }
        if chunk[0] != TS_SYNC_BYTE {
            anyhow::bail!("bad sync byte 0x{:02X}", chunk[0]);
        }

        let transport_error = chunk[1] & 0x80 != 0;
        let payload_unit_start = chunk[1] & 0x40 != 0;
        let pid = ((chunk[1] & 0x1F) as u16) << 8 | chunk[2] as u16;
        let scrambling = (chunk[3] & 0xC0) >> 6;
        let adaptation_field_ctrl = (chunk[3] & 0x30) >> 4;
        let continuity_counter = chunk[3] & 0x0F;
        let has_payload = adaptation_field_ctrl & 0x01 != 0;

        let mut discontinuity = false;
        let mut pcr = None;
        let mut payload_offset = 4usize;

        if adaptation_field_ctrl & 0x02 != 0 {
            let adap_len = chunk[4] as usize;
            payload_offset += 1 + adap_len;
            if adap_len >= 1 {
                let flags = chunk[5];
                discontinuity = flags & 0x80 != 0;
                // PCR_flag: 48-bit field right after the AF flags
                if adap_len >= 7 && flags & 0x10 != 0 {
                    let p = &chunk[6..12];
                    let base = ((p[0] as u64) << 25)
                        | ((p[1] as u64) << 17)
                        | ((p[2] as u64) << 9)
                        | ((p[3] as u64) << 1)
                        | ((p[4] as u64) >> 7);
                    let ext = (((p[4] & 0x01) as u64) << 8) | p[5] as u64;
                    pcr = Some(base * 300 + ext);
                }
            }
        }

        let payload = if has_payload && payload_offset < TS_PACKET_SIZE {
            Bytes::copy_from_slice(&chunk[payload_offset..TS_PACKET_SIZE])
        } else {
            Bytes::new()
        };

        let pts = if payload_unit_start {
            parse_pes_pts(&payload)
        } else {
            None
        };

        Ok(Self {
            pid,
            payload_unit_start,
            transport_error,
            scrambling,
            continuity_counter,
            has_payload,
            discontinuity,
            pcr,
            pts,
            payload,
        })
    }
}

/// Extracts the PTS from a PES header starting at the head of `payload`.
/// Returns `None` for non-PES payloads (sections) or headers without PTS.
fn parse_pes_pts(payload: &[u8]) -> Option<u64> {
    if payload.len() < 14 || !payload.starts_with(&[0x00, 0x00, 0x01]) {
        return None;
    }
    // Optional-header marker bits '10', then PTS_DTS_flags
    if payload[6] & 0xC0 != 0x80 || payload[7] & 0x80 == 0 {
        return None;
    }
    let p = &payload[9..14];
    Some(
        ((p[0] as u64 & 0x0E) << 29)
            | ((p[1] as u64) << 22)
            | (((p[2] as u64 & 0xFE) >> 1) << 15)
            | ((p[3] as u64) << 7)
            | ((p[4] as u64) >> 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet(pid: u16, cc: u8) -> [u8; 188] {
        let mut pkt = [0xFFu8; 188];
        pkt[0] = 0x47;
        pkt[1] = (pid >> 8) as u8;
        pkt[2] = pid as u8;
        pkt[3] = 0x10 | cc; // payload only
        pkt
    }

    #[test]
    fn header_fields() {
        let mut raw = raw_packet(0x1ABC & 0x1FFF, 7);
        raw[1] |= 0x40; // PUSI
        let pkt = TsPacket::parse(&raw).unwrap();
        assert_eq!(pkt.pid, 0x1ABC & 0x1FFF);
        assert_eq!(pkt.continuity_counter, 7);
        assert!(pkt.payload_unit_start);
        assert!(pkt.has_payload);
        assert!(!pkt.transport_error);
        assert_eq!(pkt.scrambling, 0);
        assert_eq!(pkt.payload.len(), 184);
    }

    #[test]
    fn rejects_bad_sync() {
        let mut raw = raw_packet(0x100, 0);
        raw[0] = 0x48;
        assert!(TsPacket::parse(&raw).is_err());
    }

    #[test]
    fn pcr_extraction() {
        let mut raw = raw_packet(0x100, 0);
        raw[3] = 0x30; // adaptation + payload
        raw[4] = 7; // adaptation_field_length
        raw[5] = 0x10; // PCR_flag
        // base = 2, ext = 5
        let base: u64 = 2;
        let ext: u64 = 5;
        raw[6] = (base >> 25) as u8;
        raw[7] = (base >> 17) as u8;
        raw[8] = (base >> 9) as u8;
        raw[9] = (base >> 1) as u8;
        raw[10] = (((base & 0x01) << 7) as u8) | 0x7E | ((ext >> 8) as u8 & 0x01);
        raw[11] = ext as u8;
        let pkt = TsPacket::parse(&raw).unwrap();
        assert_eq!(pkt.pcr, Some(base * 300 + ext));
        assert!(!pkt.discontinuity);
    }

    #[test]
    fn discontinuity_indicator() {
        let mut raw = raw_packet(0x100, 0);
        raw[3] = 0x30;
        raw[4] = 1;
        raw[5] = 0x80;
        let pkt = TsPacket::parse(&raw).unwrap();
        assert!(pkt.discontinuity);
        assert_eq!(pkt.pcr, None);
    }

    #[test]
    fn pes_pts() {
        let mut raw = raw_packet(0x200, 0);
        raw[1] |= 0x40;
        let pts: u64 = 900_000;
        raw[4..7].copy_from_slice(&[0x00, 0x00, 0x01]);
        raw[7] = 0xE0; // video stream id
        raw[8] = 0x00;
        raw[9] = 0x00;
        raw[10] = 0x80; // marker '10'
        raw[11] = 0x80; // PTS only
        raw[12] = 0x05; // header data length
        raw[13] = 0x21 | (((pts >> 30) as u8) << 1);
        raw[14] = (pts >> 22) as u8;
        raw[15] = 0x01 | (((pts >> 15) as u8) << 1);
        raw[16] = (pts >> 7) as u8;
        raw[17] = 0x01 | ((pts as u8) << 1);
        let pkt = TsPacket::parse(&raw).unwrap();
        assert_eq!(pkt.pts, Some(pts));
    }
}
