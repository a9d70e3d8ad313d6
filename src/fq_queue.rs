//! Start-time fair queueing on estimated service time.
//!
//! Each flow carries a virtual clock: a packet arriving to an empty flow
//! restarts the clock at `arrive_time + estimate`, otherwise the clock
//! advances by the estimate. Packets sit in one global heap keyed by their
//! virtual clock at insertion (arrival time breaks ties), which yields
//! per-flow FIFO service because clocks are monotone within a flow.

use crate::error::{Result, SimError};
use crate::heap::{HeapKey, IndexedMinHeap};
use crate::packet::{FlowId, Packet};
use ahash::AHashMap;

#[derive(Debug, Default)]
struct FqFlowMetadata {
    num_packets: usize,
    virtual_clock: f64,
}

/// Fair-queueing packet queue.
#[derive(Debug, Default)]
pub struct FqQueue {
    next_seq: u64,
    queue: IndexedMinHeap<Packet>,
    flows: AHashMap<FlowId, FqFlowMetadata>,
}

impl FqQueue {
    pub fn new() -> FqQueue {
        FqQueue::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, packet: Packet) {
        let meta = self.flows.entry(packet.flow_id).or_default();
        meta.virtual_clock = packet.job_size_estimate_ns
            + if meta.num_packets != 0 {
                meta.virtual_clock
            } else {
                packet.arrive_time_ns
            };
        meta.num_packets += 1;

        let key = HeapKey::with_secondary(meta.virtual_clock, packet.arrive_time_ns, self.next_seq);
        self.next_seq += 1;
        self.queue.push(packet, key);
    }

    pub fn pop(&mut self) -> Result<Packet> {
        let packet = self.queue.pop().ok_or(SimError::EmptyQueue)?;
        let meta = self
            .flows
            .get_mut(&packet.flow_id)
            .expect("queued packet must have flow metadata");
        meta.num_packets -= 1;
        if meta.num_packets == 0 {
            self.flows.remove(&packet.flow_id);
        }
        Ok(packet)
    }

    pub fn peek(&self) -> Result<&Packet> {
        self.queue.peek().ok_or(SimError::EmptyQueue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::TrafficClass;

    fn packet(idx: u64, flow: u32, est: f64, arrive: f64) -> Packet {
        let mut p = Packet::new(idx, FlowId::from_raw(flow), TrafficClass::Innocent, 512);
        p.job_size_estimate_ns = est;
        p.arrive_time_ns = arrive;
        p
    }

    #[test]
    fn interleaves_flows_by_virtual_clock() {
        let mut queue = FqQueue::new();
        // Flow 1 sends three 100ns jobs back to back; flow 2 sends one 150ns
        // job. Virtual clocks: f1 = 100, 200, 300; f2 = 150.
        queue.push(packet(0, 1, 100.0, 0.0));
        queue.push(packet(1, 1, 100.0, 0.0));
        queue.push(packet(2, 1, 100.0, 0.0));
        queue.push(packet(3, 2, 150.0, 0.0));

        let order: Vec<u64> = (0..4).map(|_| queue.pop().unwrap().idx).collect();
        assert_eq!(order, vec![0, 3, 1, 2]);
    }

    #[test]
    fn empty_flow_restarts_its_clock_at_arrival() {
        let mut queue = FqQueue::new();
        queue.push(packet(0, 1, 100.0, 0.0)); // clock 100
        queue.pop().unwrap();

        // The flow drained; a packet arriving at t=500 restarts at 600 rather
        // than continuing from 100.
        queue.push(packet(1, 1, 100.0, 500.0));
        queue.push(packet(2, 2, 550.0, 0.0)); // clock 550
        assert_eq!(queue.pop().unwrap().idx, 2);
        assert_eq!(queue.pop().unwrap().idx, 1);
    }

    #[test]
    fn ties_break_on_arrival_time() {
        let mut queue = FqQueue::new();
        queue.push(packet(0, 1, 100.0, 50.0)); // clock 150
        queue.push(packet(1, 2, 140.0, 10.0)); // clock 150
        assert_eq!(queue.pop().unwrap().idx, 1);
        assert_eq!(queue.pop().unwrap().idx, 0);
    }

    #[test]
    fn per_flow_order_is_monotone() {
        let mut queue = FqQueue::new();
        for idx in 0..5 {
            queue.push(packet(idx, 9, 10.0 + idx as f64, idx as f64));
        }
        let order: Vec<u64> = (0..5).map(|_| queue.pop().unwrap().idx).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_queue_errors() {
        let mut queue = FqQueue::new();
        assert!(matches!(queue.pop(), Err(SimError::EmptyQueue)));
        assert!(matches!(queue.peek(), Err(SimError::EmptyQueue)));
    }
}
