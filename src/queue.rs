//! The packet-queue family: one closed enum over every scheduling policy.
//!
//! Policies share a small surface (`push`, `pop`, `peek`, `len`,
//! `is_flow_order_maintained`, `name`); the factory pattern-matches on the
//! config's `policy` string. Per-packet heap policies (SJF, WSJF) order
//! individual packets; the flow-based variants live in
//! [`crate::inorder_queue`] and [`crate::fq_queue`]; the approximate
//! wire-speed policy wraps [`crate::hffs_queue`].

use crate::config::HffsConfig;
use crate::error::{Result, SimError};
use crate::fq_queue::FqQueue;
use crate::heap::{HeapKey, IndexedMinHeap};
use crate::hffs_queue::{HffsQueue, UnscaledWeight};
use crate::inorder_queue::{InorderMode, InorderQueue};
use crate::packet::Packet;
use std::collections::VecDeque;

/// First-come-first-served queue.
#[derive(Debug, Default)]
pub struct FcfsQueue {
    queue: VecDeque<Packet>,
}

impl FcfsQueue {
    pub fn new() -> FcfsQueue {
        FcfsQueue::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, packet: Packet) {
        self.queue.push_back(packet);
    }

    pub fn pop(&mut self) -> Result<Packet> {
        self.queue.pop_front().ok_or(SimError::EmptyQueue)
    }

    pub fn peek(&self) -> Result<&Packet> {
        self.queue.front().ok_or(SimError::EmptyQueue)
    }
}

/// How a per-packet heap policy weighs a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketMetric {
    /// Estimated job size (SJF).
    JobSize,
    /// Estimated job size over packet size (WSJF).
    JobSizePerBit,
}

impl PacketMetric {
    fn of(self, packet: &Packet) -> f64 {
        match self {
            PacketMetric::JobSize => packet.job_size_estimate_ns,
            PacketMetric::JobSizePerBit => {
                packet.job_size_estimate_ns / f64::from(packet.packet_size_bits)
            }
        }
    }
}

/// Per-packet min-heap queue (SJF / WSJF). Ties on the metric are broken by
/// insertion order, older first.
#[derive(Debug)]
pub struct HeapQueue {
    metric: PacketMetric,
    next_seq: u64,
    heap: IndexedMinHeap<Packet>,
}

impl HeapQueue {
    fn new(metric: PacketMetric) -> HeapQueue {
        HeapQueue {
            metric,
            next_seq: 0,
            heap: IndexedMinHeap::new(),
        }
    }

    pub fn sjf() -> HeapQueue {
        HeapQueue::new(PacketMetric::JobSize)
    }

    pub fn wsjf() -> HeapQueue {
        HeapQueue::new(PacketMetric::JobSizePerBit)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, packet: Packet) {
        let key = HeapKey::new(self.metric.of(&packet), self.next_seq);
        self.next_seq += 1;
        self.heap.push(packet, key);
    }

    pub fn pop(&mut self) -> Result<Packet> {
        self.heap.pop().ok_or(SimError::EmptyQueue)
    }

    pub fn peek(&self) -> Result<&Packet> {
        self.heap.peek().ok_or(SimError::EmptyQueue)
    }
}

/// Approximate WSJF over the hierarchical FFS structure: the packet's
/// `estimate / size` weight is scaled into a bucket index.
#[derive(Debug)]
pub struct HffsPolicyQueue {
    queue: HffsQueue<Packet>,
}

impl HffsPolicyQueue {
    pub fn new(config: HffsConfig) -> HffsPolicyQueue {
        HffsPolicyQueue {
            queue: HffsQueue::new(config.num_buckets, config.scale_factor),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, packet: Packet) -> Result<()> {
        let weight = UnscaledWeight {
            numerator: packet.job_size_estimate_ns,
            denominator: f64::from(packet.packet_size_bits),
        };
        self.queue.push(packet, weight)
    }

    pub fn pop(&mut self) -> Result<Packet> {
        self.queue.pop_min()
    }

    pub fn peek(&self) -> Result<&Packet> {
        self.queue.peek_min()
    }
}

/// The closed family of queueing policies.
#[derive(Debug)]
pub enum PacketQueue {
    Fcfs(FcfsQueue),
    Sjf(HeapQueue),
    Wsjf(HeapQueue),
    SjfInorder(InorderQueue),
    WsjfInorder(InorderQueue),
    Fq(FqQueue),
    Hffs(HffsPolicyQueue),
}

impl PacketQueue {
    /// Instantiate the policy named in the configuration.
    pub fn from_policy(policy: &str, hffs: HffsConfig) -> Result<PacketQueue> {
        match policy {
            "fcfs" => Ok(PacketQueue::Fcfs(FcfsQueue::new())),
            "sjf" => Ok(PacketQueue::Sjf(HeapQueue::sjf())),
            "wsjf" => Ok(PacketQueue::Wsjf(HeapQueue::wsjf())),
            "sjf_inorder" => Ok(PacketQueue::SjfInorder(InorderQueue::new(InorderMode::Sjf))),
            "wsjf_inorder" => Ok(PacketQueue::WsjfInorder(InorderQueue::new(InorderMode::Wsjf))),
            "fq" => Ok(PacketQueue::Fq(FqQueue::new())),
            "hffs" => Ok(PacketQueue::Hffs(HffsPolicyQueue::new(hffs))),
            other => Err(SimError::Config(format!("unknown queueing policy: {other}"))),
        }
    }

    /// The policy name, as used in configs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            PacketQueue::Fcfs(_) => "fcfs",
            PacketQueue::Sjf(_) => "sjf",
            PacketQueue::Wsjf(_) => "wsjf",
            PacketQueue::SjfInorder(_) => "sjf_inorder",
            PacketQueue::WsjfInorder(_) => "wsjf_inorder",
            PacketQueue::Fq(_) => "fq",
            PacketQueue::Hffs(_) => "hffs",
        }
    }

    /// Whether packets of one flow are guaranteed to be served in the order
    /// they were pushed.
    pub fn is_flow_order_maintained(&self) -> bool {
        match self {
            PacketQueue::Fcfs(_)
            | PacketQueue::SjfInorder(_)
            | PacketQueue::WsjfInorder(_)
            | PacketQueue::Fq(_) => true,
            PacketQueue::Sjf(_) | PacketQueue::Wsjf(_) | PacketQueue::Hffs(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PacketQueue::Fcfs(q) => q.len(),
            PacketQueue::Sjf(q) | PacketQueue::Wsjf(q) => q.len(),
            PacketQueue::SjfInorder(q) | PacketQueue::WsjfInorder(q) => q.len(),
            PacketQueue::Fq(q) => q.len(),
            PacketQueue::Hffs(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, packet: Packet) -> Result<()> {
        match self {
            PacketQueue::Fcfs(q) => {
                q.push(packet);
                Ok(())
            }
            PacketQueue::Sjf(q) | PacketQueue::Wsjf(q) => {
                q.push(packet);
                Ok(())
            }
            PacketQueue::SjfInorder(q) | PacketQueue::WsjfInorder(q) => {
                q.push(packet);
                Ok(())
            }
            PacketQueue::Fq(q) => {
                q.push(packet);
                Ok(())
            }
            PacketQueue::Hffs(q) => q.push(packet),
        }
    }

    pub fn pop(&mut self) -> Result<Packet> {
        match self {
            PacketQueue::Fcfs(q) => q.pop(),
            PacketQueue::Sjf(q) | PacketQueue::Wsjf(q) => q.pop(),
            PacketQueue::SjfInorder(q) | PacketQueue::WsjfInorder(q) => q.pop(),
            PacketQueue::Fq(q) => q.pop(),
            PacketQueue::Hffs(q) => q.pop(),
        }
    }

    pub fn peek(&self) -> Result<&Packet> {
        match self {
            PacketQueue::Fcfs(q) => q.peek(),
            PacketQueue::Sjf(q) | PacketQueue::Wsjf(q) => q.peek(),
            PacketQueue::SjfInorder(q) | PacketQueue::WsjfInorder(q) => q.peek(),
            PacketQueue::Fq(q) => q.peek(),
            PacketQueue::Hffs(q) => q.peek(),
        }
    }
}
