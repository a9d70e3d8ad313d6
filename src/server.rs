//! A single, non-preemptive service channel.

use crate::application::Application;
use crate::error::{Result, SimError};
use crate::packet::{Packet, INVALID_JOB_SIZE};
use crate::queue::PacketQueue;

/// The server owns the application and tracks the packet currently in
/// service. Scheduling is non-preemptive: once scheduled, a packet occupies
/// the server until its departure time.
#[derive(Debug)]
pub struct Server {
    app: Application,
    packet: Option<Packet>,
    depart_time: f64,
}

impl Server {
    /// Construct a server, rejecting application/policy pairings where the
    /// application requires per-flow ordering the queue cannot guarantee.
    pub fn new(app: Application, queue: &PacketQueue) -> Result<Server> {
        if app.flow_order_required() && !queue.is_flow_order_maintained() {
            return Err(SimError::OrderingIncompatible {
                application: app.name(),
                policy: queue.name(),
            });
        }
        Ok(Server {
            app,
            packet: None,
            depart_time: 0.0,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.packet.is_some()
    }

    pub fn depart_time(&self) -> f64 {
        self.depart_time
    }

    pub fn application(&self) -> &Application {
        &self.app
    }

    /// Stamp the estimated and actual job sizes onto a packet.
    ///
    /// Must be invoked on each packet exactly once, before the packet is
    /// scheduled or queued; the job-size fields are meaningless before this
    /// call. The estimate is stamped first so stateful applications can echo
    /// it from `process`.
    pub fn set_job_sizes(&mut self, packet: &mut Packet) {
        packet.job_size_estimate_ns = self.app.job_size_estimate(packet);
        packet.job_size_actual_ns = self.app.process(packet);
    }

    /// Begin serving `packet` at time `now`; it departs at
    /// `now + job_size_actual_ns`.
    pub fn schedule(&mut self, now: f64, packet: Packet) -> Result<()> {
        if self.is_busy() || now < self.depart_time {
            return Err(SimError::ServerBusy);
        }
        if packet.job_size_actual_ns == INVALID_JOB_SIZE || packet.job_size_estimate_ns < 0.0 {
            return Err(SimError::InvalidJobSize);
        }
        self.depart_time = now + packet.job_size_actual_ns;
        self.packet = Some(packet);
        Ok(())
    }

    /// Complete the in-service packet, stamping its departure time.
    pub fn record_departure(&mut self) -> Result<Packet> {
        let mut packet = self.packet.take().ok_or(SimError::ServerBusy)?;
        packet.depart_time_ns = self.depart_time;
        Ok(packet)
    }
}
