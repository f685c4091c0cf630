//! Generic PSI / SI section reader.
//!
//! Operates on a complete, reassembled section as produced by the demux
//! (table_id first, CRC last). CRC validation already happened there.

/// Returned by [`SectionReader::new`].
pub struct SectionReader<'a> {
    pub table_id: u8,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section: u8,
    pub table_id_ext: u16,
    pub body: &'a [u8], // bytes between fixed header & CRC
}

impl<'a> SectionReader<'a> {
    /// Validates the fixed long-form header and length field.
    pub fn new(section: &'a [u8]) -> anyhow::Result<Self> {
        if section.len() < 12 {
            anyhow::bail!("short section");
        }
        let table_id = section[0];
        let sec_len = ((section[1] & 0x0F) as usize) << 8 | section[2] as usize;
        if sec_len < 9 || 3 + sec_len != section.len() {
            anyhow::bail!("invalid section_length");
        }

        Ok(Self {
            table_id,
            version: (section[5] & 0x3E) >> 1,
            current_next: section[5] & 0x01 != 0,
            section_number: section[6],
            last_section: section[7],
            table_id_ext: u16::from_be_bytes(section[3..5].try_into()?),
            body: &section[8..section.len() - 4],
        })
    }
}
