//! Flow-based in-order queues: SJF-inorder and WSJF-inorder.
//!
//! Both policies keep a FIFO per flow and schedule whole flows by the ratio of
//! their queued backlog: `sum(job) / count` for SJF-inorder and
//! `sum(job) / sum(packet)` for WSJF-inorder. Only head-of-line packets are
//! ever served, so per-flow arrival order is preserved by construction. The
//! flow's entry in the priority heap is re-keyed through a stored handle on
//! every push and pop (decrease-key).

use crate::error::{Result, SimError};
use crate::heap::{Handle, HeapKey, IndexedMinHeap};
use crate::packet::{FlowId, Packet};
use ahash::AHashMap;
use std::collections::VecDeque;

/// Which backlog ratio orders the flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InorderMode {
    /// `sum(job_size_estimate) / queued packet count`.
    Sjf,
    /// `sum(job_size_estimate) / sum(packet_size_bits)`.
    Wsjf,
}

impl InorderMode {
    pub const fn policy_name(self) -> &'static str {
        match self {
            InorderMode::Sjf => "sjf_inorder",
            InorderMode::Wsjf => "wsjf_inorder",
        }
    }
}

/// Per-flow backlog and the flow's handle into the priority heap.
#[derive(Debug)]
struct FlowMetadata {
    handle: Handle,
    /// Tie-break sequence assigned when the flow (re-)entered the heap.
    flow_seq: u64,
    fifo: VecDeque<Packet>,
    total_jsize: f64,
    total_psize: u64,
}

impl FlowMetadata {
    fn push(&mut self, packet: Packet) {
        self.total_jsize += packet.job_size_estimate_ns;
        self.total_psize += u64::from(packet.packet_size_bits);
        self.fifo.push_back(packet);
    }

    fn pop(&mut self) -> Packet {
        let packet = self.fifo.pop_front().expect("flow queue cannot be empty");
        self.total_jsize -= packet.job_size_estimate_ns;
        self.total_psize -= u64::from(packet.packet_size_bits);
        debug_assert!(self.total_jsize >= -1e-9);
        packet
    }

    fn ratio(&self, mode: InorderMode) -> f64 {
        match mode {
            InorderMode::Sjf => self.total_jsize / self.fifo.len() as f64,
            InorderMode::Wsjf => self.total_jsize / self.total_psize as f64,
        }
    }
}

/// A flow-based in-order queue (SJF or WSJF flavoured, see [`InorderMode`]).
#[derive(Debug)]
pub struct InorderQueue {
    mode: InorderMode,
    len: usize,
    next_flow_seq: u64,
    priorities: IndexedMinHeap<FlowId>,
    flows: AHashMap<FlowId, FlowMetadata>,
}

impl InorderQueue {
    pub fn new(mode: InorderMode) -> InorderQueue {
        InorderQueue {
            mode,
            len: 0,
            next_flow_seq: 0,
            priorities: IndexedMinHeap::new(),
            flows: AHashMap::new(),
        }
    }

    pub fn mode(&self) -> InorderMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append to the flow's FIFO and re-key (or insert) the flow's heap entry
    /// with the updated backlog ratio.
    pub fn push(&mut self, packet: Packet) {
        let flow_id = packet.flow_id;
        match self.flows.get_mut(&flow_id) {
            Some(meta) => {
                debug_assert!(!meta.fifo.is_empty());
                meta.push(packet);
                let key = HeapKey::new(meta.ratio(self.mode), meta.flow_seq);
                self.priorities.update(meta.handle, key);
            }
            None => {
                let flow_seq = self.next_flow_seq;
                self.next_flow_seq += 1;
                // First packet: the flow ratio reduces to the packet's own
                // metric, so the heap entry can be created up front and its
                // handle stored in the fresh metadata.
                let ratio = match self.mode {
                    InorderMode::Sjf => packet.job_size_estimate_ns,
                    InorderMode::Wsjf => {
                        packet.job_size_estimate_ns / f64::from(packet.packet_size_bits)
                    }
                };
                let handle = self.priorities.push(flow_id, HeapKey::new(ratio, flow_seq));
                let mut meta = FlowMetadata {
                    handle,
                    flow_seq,
                    fifo: VecDeque::new(),
                    total_jsize: 0.0,
                    total_psize: 0,
                };
                meta.push(packet);
                self.flows.insert(flow_id, meta);
            }
        }
        self.len += 1;
    }

    /// Pop the head-of-line packet of the minimum-ratio flow.
    pub fn pop(&mut self) -> Result<Packet> {
        let &flow_id = self.priorities.peek().ok_or(SimError::EmptyQueue)?;
        let meta = self
            .flows
            .get_mut(&flow_id)
            .expect("flow in heap must have metadata");
        let packet = meta.pop();

        if meta.fifo.is_empty() {
            self.priorities.pop();
            self.flows.remove(&flow_id);
        } else {
            let key = HeapKey::new(meta.ratio(self.mode), meta.flow_seq);
            let handle = meta.handle;
            self.priorities.update(handle, key);
        }
        self.len -= 1;
        Ok(packet)
    }

    /// The head-of-line packet of the minimum-ratio flow.
    pub fn peek(&self) -> Result<&Packet> {
        let flow_id = self.priorities.peek().ok_or(SimError::EmptyQueue)?;
        Ok(self.flows[flow_id]
            .fifo
            .front()
            .expect("flow in heap must have packets"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::TrafficClass;

    fn packet(idx: u64, flow: u32, est: f64, psize: u32) -> Packet {
        let mut p = Packet::new(idx, FlowId::from_raw(flow), TrafficClass::Innocent, psize);
        p.job_size_estimate_ns = est;
        p
    }

    #[test]
    fn sjf_inorder_orders_flows_by_mean_backlog() {
        let mut queue = InorderQueue::new(InorderMode::Sjf);
        queue.push(packet(0, 1, 100.0, 512));
        queue.push(packet(1, 1, 100.0, 512)); // flow 1 mean: 100
        queue.push(packet(2, 2, 50.0, 512)); // flow 2 mean: 50

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().flow_id, FlowId::from_raw(2));
        assert_eq!(queue.pop().unwrap().idx, 0);
        assert_eq!(queue.pop().unwrap().idx, 1);
        assert!(queue.pop().is_err());
    }

    #[test]
    fn wsjf_inorder_uses_byte_denominator() {
        let mut queue = InorderQueue::new(InorderMode::Wsjf);
        // Flow 1: ratio 100/512; flow 2: ratio 100/4096 (bigger packet wins).
        queue.push(packet(0, 1, 100.0, 512));
        queue.push(packet(1, 2, 100.0, 4096));
        assert_eq!(queue.pop().unwrap().flow_id, FlowId::from_raw(2));
        assert_eq!(queue.pop().unwrap().flow_id, FlowId::from_raw(1));
    }

    #[test]
    fn flow_order_is_preserved_within_a_flow() {
        let mut queue = InorderQueue::new(InorderMode::Sjf);
        // Later packets of flow 1 are cheap, but must still come out in
        // arrival order behind the expensive head-of-line packet.
        queue.push(packet(0, 1, 1000.0, 512));
        queue.push(packet(1, 1, 1.0, 512));
        queue.push(packet(2, 1, 1.0, 512));

        let order: Vec<u64> = (0..3).map(|_| queue.pop().unwrap().idx).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn pop_rekeys_the_remaining_backlog() {
        let mut queue = InorderQueue::new(InorderMode::Sjf);
        // Flow 1: [10, 1000] (mean 505); flow 2: [600] (mean 600).
        queue.push(packet(0, 1, 10.0, 512));
        queue.push(packet(1, 1, 1000.0, 512));
        queue.push(packet(2, 2, 600.0, 512));

        // Flow 1 wins first; after its head departs, its mean rises to 1000
        // and flow 2 moves ahead.
        assert_eq!(queue.pop().unwrap().idx, 0);
        assert_eq!(queue.pop().unwrap().idx, 2);
        assert_eq!(queue.pop().unwrap().idx, 1);
    }

    #[test]
    fn peek_matches_pop() {
        let mut queue = InorderQueue::new(InorderMode::Wsjf);
        queue.push(packet(0, 3, 10.0, 512));
        queue.push(packet(1, 4, 20.0, 512));
        let head = queue.peek().unwrap().idx;
        assert_eq!(queue.pop().unwrap().idx, head);
    }

    #[test]
    fn empty_queue_errors() {
        let mut queue = InorderQueue::new(InorderMode::Sjf);
        assert!(matches!(queue.peek(), Err(SimError::EmptyQueue)));
        assert!(matches!(queue.pop(), Err(SimError::EmptyQueue)));
    }
}
