//! Packet representation shared by the traffic generators, queues, and server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel job size marking a packet that produces no work at the server
/// (e.g. a TCP SYN, a duplicate segment, or an out-of-window segment).
pub const INVALID_JOB_SIZE: f64 = -1.0;

/// Smallest packet the generators are expected to emit (64 bytes).
pub const PACKET_SIZE_MIN_BITS: u32 = 512;
/// Largest packet the generators are expected to emit (1518 bytes).
pub const PACKET_SIZE_MAX_BITS: u32 = 12144;

pub const BITS_PER_BYTE: u32 = 8;
pub const NANOSECS_PER_SEC: f64 = 1e9;
pub const BITS_PER_GB: f64 = 1e9;

/// Class of traffic (innocent or adversarial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficClass {
    Innocent,
    Attack,
}

impl TrafficClass {
    /// Single-letter tag used by the packet log.
    pub const fn tag(self) -> &'static str {
        match self {
            TrafficClass::Innocent => "I",
            TrafficClass::Attack => "A",
        }
    }
}

/// Flow identity: the four-tuple shared by every packet of a flow.
///
/// Hashing and equality are componentwise over the tuple. The [`fmt::Display`]
/// impl renders the packed hex form used by the packet log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlowId {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowId {
    pub const fn new(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16) -> FlowId {
        FlowId {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    /// Construct a flow identity for non-networking workloads by injecting a
    /// raw identifier into the low 32 bits, leaving the other fields zero.
    /// Used by the synthetic traffic generators.
    pub const fn from_raw(value: u32) -> FlowId {
        FlowId {
            src_ip: value,
            dst_ip: 0,
            src_port: 0,
            dst_port: 0,
        }
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}{:08x}{:04x}{:04x}",
            self.src_ip, self.dst_ip, self.src_port, self.dst_port
        )
    }
}

/// TCP header data carried by trace-driven packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpHeader {
    pub valid: bool,
    pub syn: bool,
    pub fin: bool,
    pub rst: bool,
    /// First payload byte index of this segment.
    pub psn: u32,
    /// One past the last payload byte index, i.e. the payload is `[psn, next_psn)`.
    pub next_psn: u32,
}

impl TcpHeader {
    pub const fn new(valid: bool, syn: bool, fin: bool, rst: bool, psn: u32, next_psn: u32) -> TcpHeader {
        TcpHeader {
            valid,
            syn,
            fin,
            rst,
            psn,
            next_psn,
        }
    }

    /// The segment's payload byte range `[start, end)`.
    pub const fn seq_range(&self) -> (u32, u32) {
        (self.psn, self.next_psn)
    }

    /// A segment carrying no payload bytes (pure ACK and friends).
    pub const fn is_pass_through(&self) -> bool {
        self.psn == self.next_psn
    }

    pub const fn is_fin_or_rst(&self) -> bool {
        self.fin || self.rst
    }
}

/// A single simulated network packet.
///
/// Packets are value-copied between the generator, the queue, and the server;
/// whoever currently holds the packet owns it. Job-size fields start out as
/// [`INVALID_JOB_SIZE`] and are stamped by the server's application before the
/// packet is queued or scheduled.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Monotonically increasing packet index assigned by the simulator.
    pub idx: u64,
    pub flow_id: FlowId,
    pub class: TrafficClass,
    pub packet_size_bits: u32,
    pub tcp_header: TcpHeader,
    pub job_size_estimate_ns: f64,
    pub job_size_actual_ns: f64,
    pub arrive_time_ns: f64,
    pub depart_time_ns: f64,
}

impl Packet {
    pub fn new(idx: u64, flow_id: FlowId, class: TrafficClass, packet_size_bits: u32) -> Packet {
        Packet {
            idx,
            flow_id,
            class,
            packet_size_bits,
            tcp_header: TcpHeader::default(),
            job_size_estimate_ns: INVALID_JOB_SIZE,
            job_size_actual_ns: INVALID_JOB_SIZE,
            arrive_time_ns: 0.0,
            depart_time_ns: 0.0,
        }
    }

    /// Queueing latency; only meaningful once both timestamps are stamped.
    ///
    /// # Panics
    /// Panics if the departure time precedes the arrival time, which would
    /// indicate a scheduling bug.
    pub fn latency_ns(&self) -> f64 {
        assert!(
            self.depart_time_ns >= self.arrive_time_ns,
            "departure time must be GEQ arrival time"
        );
        self.depart_time_ns - self.arrive_time_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_id_renders_packed_hex() {
        let id = FlowId::new(0x0a000001, 0x0a000002, 0x1f90, 0x0050);
        assert_eq!(id.to_string(), "0a0000010a0000021f900050");
    }

    #[test]
    fn flow_id_from_raw_zeroes_remaining_fields() {
        let id = FlowId::from_raw(7);
        assert_eq!(id, FlowId::new(7, 0, 0, 0));
    }

    #[test]
    fn pass_through_detection() {
        let header = TcpHeader::new(true, false, false, false, 100, 100);
        assert!(header.is_pass_through());
        let header = TcpHeader::new(true, false, false, false, 100, 200);
        assert!(!header.is_pass_through());
        assert_eq!(header.seq_range(), (100, 200));
    }

    #[test]
    fn fresh_packet_has_invalid_job_sizes() {
        let p = Packet::new(0, FlowId::from_raw(1), TrafficClass::Innocent, 512);
        assert_eq!(p.job_size_estimate_ns, INVALID_JOB_SIZE);
        assert_eq!(p.job_size_actual_ns, INVALID_JOB_SIZE);
        assert_eq!(p.class.tag(), "I");
    }
}
