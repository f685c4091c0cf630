use crate::psi::section::SectionReader;

/// ─────────── PMT ───────────
#[derive(Clone)]
pub struct PmtSection {
    pub version: u8,
    pub service_id: u16,
    pub pcr_pid: u16,
    pub streams: Vec<EsEntry>,
}
#[derive(Clone)]
pub struct EsEntry {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

pub fn parse_pmt(section: &[u8]) -> anyhow::Result<PmtSection> {
    let sec = SectionReader::new(section)?;
    if sec.table_id != crate::constants::TID_PMT {
        anyhow::bail!("not PMT");
    }
    let b = sec.body;
    if b.len() < 4 {
        anyhow::bail!("truncated PMT body");
    }

    let pcr_pid = (((b[0] & 0x1F) as u16) << 8) | (b[1] as u16);
    let prog_info_len = (((b[2] & 0x0F) as usize) << 8) | (b[3] as usize);
    let mut idx = 4 + prog_info_len; // skip program descriptors

    let mut streams = Vec::new();
    while idx + 5 <= b.len() {
        let stype = b[idx];
        let pid = (((b[idx + 1] & 0x1F) as u16) << 8) | (b[idx + 2] as u16);
        let eslen = (((b[idx + 3] & 0x0F) as usize) << 8) | (b[idx + 4] as usize);
        streams.push(EsEntry { stream_type: stype, elementary_pid: pid });
        idx += 5 + eslen; // skip ES descriptors
    }

    Ok(PmtSection {
        version: sec.version,
        service_id: sec.table_id_ext,
        pcr_pid,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PMT for service 3: PCR PID 0x1FF, program descriptor of 2 bytes, one
    /// H.264 stream on 0x200 with a 3-byte ES descriptor.
    fn sample_pmt() -> Vec<u8> {
        let body = [
            0xE1, 0xFF, // PCR PID
            0xF0, 0x02, 0x0E, 0x00, // program_info_length 2 + descriptor
            0x1B, 0xE2, 0x00, 0xF0, 0x03, 0x52, 0x01, 0x00, // stream + descriptor
        ];
        let len = 5 + body.len() + 4;
        let mut sec = vec![0x02, 0xB0 | (len >> 8) as u8, len as u8, 0x00, 0x03, 0xC3, 0, 0];
        sec.extend_from_slice(&body);
        sec.extend_from_slice(&[0, 0, 0, 0]); // CRC slot; validated by the demux
        sec
    }

    #[test]
    fn skips_descriptors() {
        let pmt = parse_pmt(&sample_pmt()).unwrap();
        assert_eq!(pmt.service_id, 3);
        assert_eq!(pmt.version, 1);
        assert_eq!(pmt.pcr_pid, 0x1FF);
        assert_eq!(pmt.streams.len(), 1);
        assert_eq!(pmt.streams[0].elementary_pid, 0x200);
        assert_eq!(pmt.streams[0].stream_type, 0x1B);
    }

    #[test]
    fn rejects_foreign_table_id() {
        let mut sec = sample_pmt();
        sec[0] = 0x00;
        assert!(parse_pmt(&sec).is_err());
    }
}
