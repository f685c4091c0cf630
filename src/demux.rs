//! PID-filtered PSI section demultiplexer.
//!
//! Reassembles sections from transport packets on registered PIDs, validates
//! CRC-32 (MPEG-2) on long-form sections and groups complete section sets
//! into tables. Results come back as [`DemuxEvent`]s from [`SectionDemux::push`],
//! processed by the caller before the next packet is fed — the demux never
//! holds references into caller state, only PID values.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use crc::{CRC_32_MPEG_2, Crc};

use crate::packet::TsPacket;

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidSectionStatus {
    /// CRC-32 of a long-form section did not match.
    BadCrc,
    /// Structurally unusable: bad pointer field or truncated at a unit start.
    Malformed,
}

pub enum DemuxEvent {
    /// A complete, CRC-valid section arrived.
    Section { pid: u16, table_id: u8, section_number: u8 },
    /// All sections 0..=last_section_number of one table version arrived,
    /// in section-number order.
    Table { pid: u16, table_id: u8, sections: Vec<Bytes> },
    /// A section failed validation.
    Invalid { pid: u16, status: InvalidSectionStatus },
}

struct TableAssembly {
    version: u8,
    last_section: u8,
    sections: HashMap<u8, Bytes>,
}

#[derive(Default)]
struct PidAssembler {
    buffer: Vec<u8>,
    /// A section head was seen; continuation bytes are meaningful.
    open: bool,
    tables: HashMap<u8, TableAssembly>,
}

pub struct SectionDemux {
    pids: HashSet<u16>,
    assemblers: HashMap<u16, PidAssembler>,
}

impl SectionDemux {
    pub fn new() -> Self {
        Self { pids: HashSet::new(), assemblers: HashMap::new() }
    }

    pub fn add_pid(&mut self, pid: u16) {
        self.pids.insert(pid);
    }

    pub fn remove_pid(&mut self, pid: u16) {
        self.pids.remove(&pid);
        self.assemblers.remove(&pid);
    }

    pub fn has_pid(&self, pid: u16) -> bool {
        self.pids.contains(&pid)
    }

    /// Feed one packet; returns the events it completed, in arrival order.
    pub fn push(&mut self, pkt: &TsPacket) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        if !self.pids.contains(&pkt.pid) || pkt.payload.is_empty() {
            return events;
        }
        let asm = self.assemblers.entry(pkt.pid).or_default();

        if pkt.payload_unit_start {
            let pointer = pkt.payload[0] as usize;
            if 1 + pointer > pkt.payload.len() {
                events.push(DemuxEvent::Invalid {
                    pid: pkt.pid,
                    status: InvalidSectionStatus::Malformed,
                });
                asm.buffer.clear();
                asm.open = false;
                return events;
            }
            // Bytes before the pointer complete the previous section.
            if asm.open {
                asm.buffer.extend_from_slice(&pkt.payload[1..1 + pointer]);
                drain_sections(pkt.pid, asm, &mut events);
                if !asm.buffer.is_empty() {
                    // Previous section was cut off by this unit start.
                    events.push(DemuxEvent::Invalid {
                        pid: pkt.pid,
                        status: InvalidSectionStatus::Malformed,
                    });
                }
            }
            asm.buffer = pkt.payload[1 + pointer..].to_vec();
            asm.open = true;
            drain_sections(pkt.pid, asm, &mut events);
        } else if asm.open {
            asm.buffer.extend_from_slice(&pkt.payload);
            drain_sections(pkt.pid, asm, &mut events);
        }
        events
    }
}

impl Default for SectionDemux {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls every complete section out of the assembler buffer.
fn drain_sections(pid: u16, asm: &mut PidAssembler, events: &mut Vec<DemuxEvent>) {
    loop {
        if asm.buffer.is_empty() {
            return;
        }
        if asm.buffer[0] == 0xFF {
            // stuffing runs to the end of the payload unit
            asm.buffer.clear();
            asm.open = false;
            return;
        }
        if asm.buffer.len() < 3 {
            return;
        }
        let sec_len = ((asm.buffer[1] & 0x0F) as usize) << 8 | asm.buffer[2] as usize;
        let total = 3 + sec_len;
        if asm.buffer.len() < total {
            return;
        }
        let section: Vec<u8> = asm.buffer.drain(..total).collect();
        complete_section(pid, Bytes::from(section), &mut asm.tables, events);
    }
}

fn complete_section(
    pid: u16,
    section: Bytes,
    tables: &mut HashMap<u8, TableAssembly>,
    events: &mut Vec<DemuxEvent>,
) {
    let table_id = section[0];
    let long_form = section[1] & 0x80 != 0;

    if !long_form {
        // Short sections (TDT and friends) carry no CRC and no numbering.
        events.push(DemuxEvent::Section { pid, table_id, section_number: 0 });
        return;
    }

    if section.len() < 12 {
        events.push(DemuxEvent::Invalid { pid, status: InvalidSectionStatus::Malformed });
        return;
    }
    let n = section.len();
    let crc_calc = CRC_MPEG.checksum(&section[..n - 4]);
    let crc_pkt = u32::from_be_bytes([section[n - 4], section[n - 3], section[n - 2], section[n - 1]]);
    if crc_calc != crc_pkt {
        events.push(DemuxEvent::Invalid { pid, status: InvalidSectionStatus::BadCrc });
        return;
    }

    let version = (section[5] & 0x3E) >> 1;
    let section_number = section[6];
    let last_section = section[7];
    events.push(DemuxEvent::Section { pid, table_id, section_number });

    if section_number > last_section {
        return; // inconsistent numbering; keep the section event only
    }
    let entry = tables.entry(table_id).or_insert_with(|| TableAssembly {
        version,
        last_section,
        sections: HashMap::new(),
    });
    if entry.version != version || entry.last_section != last_section {
        entry.version = version;
        entry.last_section = last_section;
        entry.sections.clear();
    }
    entry.sections.insert(section_number, section);

    if (0..=entry.last_section).all(|n| entry.sections.contains_key(&n)) {
        let mut sections = Vec::with_capacity(entry.last_section as usize + 1);
        for n in 0..=entry.last_section {
            if let Some(s) = entry.sections.remove(&n) {
                sections.push(s);
            }
        }
        tables.remove(&table_id);
        events.push(DemuxEvent::Table { pid, table_id, sections });
    }
}
