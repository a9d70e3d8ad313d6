//! TCP reassembly engine: per-flow out-of-order segment tracking.
//!
//! The cost of reassembling a segment depends on how many out-of-order
//! intervals its flow has pending, which makes the engine both the job-size
//! *estimator* and the job-size *oracle* for the `tcp_reassembly` application.
//! Flow state is created lazily on the first data segment and destroyed on
//! FIN/RST.

use crate::packet::{FlowId, Packet, INVALID_JOB_SIZE};
use ahash::AHashMap;
use std::collections::VecDeque;

/// Fixed service cost of any reassembly operation.
pub const COST_BASE: u32 = 116;
/// Incremental cost per out-of-order list traversal.
pub const COST_PER_TRAVERSAL: u32 = 4;
/// Segments starting beyond this window past `next_psn` are dropped.
pub const REASSEMBLY_WINDOW_BYTES: u32 = 1 << 16;

/// Per-flow TCP state.
///
/// `ooo_list` holds disjoint byte intervals `[a, b)` of out-of-order payload,
/// sorted by `a`, with every `a` strictly greater than `next_psn`. `next_psn`
/// only advances when the head interval becomes contiguous with it.
#[derive(Debug, Default)]
pub struct TcpFlowState {
    next_psn: u32,
    ooo_list: VecDeque<(u32, u32)>,
}

impl TcpFlowState {
    fn to_service_time(num_traversals: u32) -> f64 {
        f64::from(COST_BASE + COST_PER_TRAVERSAL * num_traversals)
    }

    pub fn next_psn(&self) -> u32 {
        self.next_psn
    }

    pub fn ooo_len(&self) -> usize {
        self.ooo_list.len()
    }

    /// Classify a segment without mutating state. Returns the sentinel for
    /// segments that produce no reassembly work; otherwise approximates the
    /// service time by the current out-of-order list length.
    pub fn service_time_estimate(&self, packet: &Packet) -> f64 {
        let header = &packet.tcp_header;
        let (start, end) = header.seq_range();

        // SYN packet (or equivalent)
        if header.syn || self.next_psn == 0 {
            return INVALID_JOB_SIZE;
        }
        // In-order flow, and this segment keeps it so
        if self.ooo_list.is_empty() && self.next_psn >= start {
            return INVALID_JOB_SIZE;
        }
        // Past the reassembly window
        if u64::from(start) > u64::from(self.next_psn) + u64::from(REASSEMBLY_WINDOW_BYTES) {
            return INVALID_JOB_SIZE;
        }
        // Obviously a duplicate
        if self.next_psn >= end {
            return INVALID_JOB_SIZE;
        }
        Self::to_service_time(self.ooo_list.len() as u32)
    }

    /// Insert the segment into the out-of-order list, coalescing covered
    /// intervals and releasing any head intervals that become in-order.
    /// Returns the service time, or the sentinel for non-jobs.
    ///
    /// Traversals count the intervals stepped past while locating the
    /// insertion position, plus every interval released during in-order
    /// drainage.
    pub fn process(&mut self, packet: &Packet) -> f64 {
        let header = &packet.tcp_header;
        let (mut start, mut end) = header.seq_range();

        // SYN packet (or equivalent): reset the expected sequence number.
        if header.syn || self.next_psn == 0 {
            if self.ooo_list.is_empty() {
                self.next_psn = header.next_psn;
            } else {
                // A duplicate SYN must not advance the PSN.
                debug_assert!(header.next_psn <= self.next_psn);
            }
            return INVALID_JOB_SIZE;
        }
        // The flow is in-order, and this segment keeps it so.
        if self.ooo_list.is_empty() && self.next_psn >= start {
            self.next_psn = self.next_psn.max(end);
            return INVALID_JOB_SIZE;
        }
        // Past the reassembly window: drop.
        if u64::from(start) > u64::from(self.next_psn) + u64::from(REASSEMBLY_WINDOW_BYTES) {
            return INVALID_JOB_SIZE;
        }
        // Obviously a duplicate.
        if self.next_psn >= end {
            return INVALID_JOB_SIZE;
        }

        // Locate the insertion position: the first interval whose end covers
        // the segment's end. Count the intervals stepped past.
        let mut insert_pos = 0;
        let mut num_traversals = 0u32;
        while insert_pos < self.ooo_list.len() && end > self.ooo_list[insert_pos].1 {
            insert_pos += 1;
            num_traversals += 1;
        }
        start = start.max(self.next_psn);

        // Not inserting at the tail: clip against the following interval.
        if insert_pos < self.ooo_list.len() {
            end = end.min(self.ooo_list[insert_pos].0);
        }
        // Not inserting at the head: erase predecessors fully covered by the
        // segment, then clip the segment's start against the survivor.
        if insert_pos > 0 {
            let mut prev = insert_pos - 1;
            while prev > 0 && self.ooo_list[prev].0 >= start {
                self.ooo_list.remove(prev);
                insert_pos -= 1;
                prev -= 1;
            }
            if self.ooo_list[prev].0 >= start {
                self.ooo_list.remove(prev);
                insert_pos -= 1;
            } else {
                start = start.max(self.ooo_list[prev].1);
            }
        }
        // The segment carries at least one new byte.
        if end > start {
            self.ooo_list.insert(insert_pos, (start, end));

            // Release any head intervals that are now in-order.
            while let Some(&(a, b)) = self.ooo_list.front() {
                if self.next_psn != a {
                    break;
                }
                self.next_psn = b;
                self.ooo_list.pop_front();
                num_traversals += 1;
            }
        }
        Self::to_service_time(num_traversals)
    }
}

/// The reassembly engine: flow-id keyed state map.
#[derive(Debug, Default)]
pub struct TcpReassembly {
    flows: AHashMap<FlowId, TcpFlowState>,
}

impl TcpReassembly {
    pub fn new() -> TcpReassembly {
        TcpReassembly::default()
    }

    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }

    pub fn flow(&self, flow_id: &FlowId) -> Option<&TcpFlowState> {
        self.flows.get(flow_id)
    }

    /// Process a packet against its flow state.
    ///
    /// With `update` set, the flow map is mutated: FIN/RST erase the flow,
    /// data segments find-or-create it and run the real insertion. Without
    /// `update`, only existing flows are consulted, via the side-effect-free
    /// estimate.
    pub fn process_internal(&mut self, packet: &Packet, update: bool) -> f64 {
        let header = &packet.tcp_header;
        // Only TCP packets require non-trivial processing.
        if !header.valid {
            return INVALID_JOB_SIZE;
        }
        if header.is_fin_or_rst() {
            if update {
                self.flows.remove(&packet.flow_id);
            }
            return INVALID_JOB_SIZE;
        }
        if header.is_pass_through() {
            return INVALID_JOB_SIZE;
        }
        if update {
            self.flows
                .entry(packet.flow_id)
                .or_default()
                .process(packet)
        } else if let Some(state) = self.flows.get(&packet.flow_id) {
            state.service_time_estimate(packet)
        } else {
            INVALID_JOB_SIZE
        }
    }
}
