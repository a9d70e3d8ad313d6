//! The discrete-event simulation loop.
//!
//! A single non-preemptive server drains a policy-controlled queue fed by an
//! innocent and an adversarial traffic generator. The loop interleaves
//! arrival and departure events in timestamp order and collects goodput and
//! displacement-factor metrics for the innocent traffic.

use crate::application::Application;
use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::packet::{Packet, TrafficClass, BITS_PER_GB, INVALID_JOB_SIZE};
use crate::queue::PacketQueue;
use crate::server::Server;
use crate::traffic::TrafficGenerator;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Epsilon displacement factor reported whenever any attack traffic is
/// present, to keep log-scale plots well-defined.
const DISPLACEMENT_EPSILON: f64 = 1e-4;
/// Relative goodput loss below which the displacement factor is thresholded
/// to the epsilon.
const DISPLACEMENT_LOSS_THRESHOLD: f64 = 1e-2;

/// End-of-run performance metrics for the innocent traffic class.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub average_psize_bits: u64,
    pub maximum_psize_bits: u32,
    pub average_jsize_ns: f64,
    pub maximum_jsize_ns: f64,
    pub num_innocent_arrivals: u64,
    pub num_arrivals: u64,
    /// Maximum service rate in Gbps: average packet size over average job size.
    pub service_rate_gbps: f64,
    /// Innocent offered load in Gbps.
    pub input_rate_gbps: f64,
    pub average_goodput_gbps: f64,
    pub steady_state_goodput_gbps: f64,
    pub displacement_factor: f64,
}

/// The simulator: event loop plus the components it coordinates.
#[derive(Debug)]
pub struct Simulator {
    is_dry_run: bool,
    max_num_arrivals: u64,
    server: Server,
    queue: PacketQueue,
    tg_innocent: TrafficGenerator,
    tg_attack: TrafficGenerator,
    done: bool,
}

impl Simulator {
    pub fn new(is_dry_run: bool, config: &SimulationConfig) -> Result<Simulator> {
        let max_num_arrivals = config.max_num_arrivals.unwrap_or(u64::MAX);

        // A dry run always uses FCFS regardless of the configured policy.
        let queue = if is_dry_run {
            if let Some(policy) = config.policy.as_deref() {
                if policy != "fcfs" {
                    info!("'policy' is specified in dry-run mode; ignoring it and using fcfs");
                }
            }
            PacketQueue::from_policy("fcfs", config.hffs)?
        } else {
            let policy = config
                .policy
                .as_deref()
                .ok_or_else(|| SimError::Config("must specify 'policy' to use".into()))?;
            PacketQueue::from_policy(policy, config.hffs)?
        };

        let application = Application::from_config(&config.application)?;
        let server = Server::new(application, &queue)?;

        let tg_innocent = TrafficGenerator::from_config(
            is_dry_run,
            TrafficClass::Innocent,
            &config.innocent_traffic,
            0,
        )?;
        let tg_attack = match &config.attack_traffic {
            Some(attack_config) => TrafficGenerator::from_config(
                is_dry_run,
                TrafficClass::Attack,
                attack_config,
                tg_innocent.num_flows(),
            )?,
            None => TrafficGenerator::disabled_attack(),
        };

        // The arrival cap substitutes for a trace's natural end, so exactly
        // one of the two must bound the simulation.
        let is_max_arrival_count_set = max_num_arrivals != u64::MAX;
        if is_max_arrival_count_set == tg_innocent.is_trace_driven() {
            return Err(SimError::Config(
                "'max_num_arrivals' must be set iff not using a trace".into(),
            ));
        }

        Ok(Simulator {
            is_dry_run,
            max_num_arrivals,
            server,
            queue,
            tg_innocent,
            tg_attack,
            done: false,
        })
    }

    pub fn policy_name(&self) -> &'static str {
        self.queue.name()
    }

    /// Print the simulation configuration banner.
    pub fn print_config(&self) {
        if self.is_dry_run {
            println!("Starting dry run...");
        }
        println!("==========================================");
        println!("               Input Config               ");
        println!("==========================================");
        println!("Policy: {},", self.queue.name());
        println!("Application: {}", self.server.application().describe());
        println!("Innocent traffic-gen: {}", self.tg_innocent.describe());
        if !self.is_dry_run {
            println!("Attack traffic-gen: {}", self.tg_attack.describe());
        }
        println!();
    }

    /// Run the simulation to completion.
    ///
    /// Note: a packet whose actual job size is invalid is discarded without
    /// advancing its generator's clock, so the next packet from that
    /// generator carries the same arrival timestamp. Trace replay depends on
    /// this (a SYN shares its timestamp with the first data segment).
    pub fn run(&mut self, verbose: bool, packets_path: Option<&Path>) -> Result<SimulationReport> {
        assert!(!self.done, "simulator instances are single-use");
        let mut logged_packets: Option<Vec<Packet>> = packets_path.map(|_| Vec::new());

        if verbose {
            self.print_config();
        }

        // Housekeeping
        let mut num_arrivals: u64 = 0;
        let mut num_departures: u64 = 0;
        let mut num_innocent_arrivals: u64 = 0;

        // Profiling (innocent traffic only)
        let mut total_psize_i: u64 = 0;
        let mut total_jsize_i: f64 = 0.0;
        let mut maximum_psize_i: u32 = 0;
        let mut maximum_jsize_i: f64 = 0.0;
        let mut last_arrive_time_i: f64 = 0.0;
        let mut last_depart_time_i: f64 = 0.0;
        let mut ss_total_psize_i: u64 = 0;
        let mut steady_state_ns: f64 = 0.0;

        let mut more_arrivals =
            self.tg_innocent.has_new_arrival() && num_innocent_arrivals < self.max_num_arrivals;

        while more_arrivals || num_arrivals != num_departures {
            let is_steady_state = more_arrivals;
            let at_attack = self.tg_attack.next_arrival_time();
            let at_innocent = self.tg_innocent.next_arrival_time();
            let next_departure_time = self.server.depart_time();
            let next_arrival_time = at_attack.min(at_innocent);

            // Simulate an arrival
            if more_arrivals && (next_arrival_time < next_departure_time || !self.server.is_busy())
            {
                let tg = if at_attack < at_innocent {
                    &mut self.tg_attack
                } else {
                    &mut self.tg_innocent
                };
                let mut arrival = tg.next_arrival(num_arrivals)?;
                self.server.set_job_sizes(&mut arrival);

                // Only packets with valid job sizes become work; the rest
                // are discarded and do not advance the arrival clock.
                if arrival.job_size_actual_ns != INVALID_JOB_SIZE {
                    tg.advance_arrival_time();

                    if arrival.job_size_estimate_ns == INVALID_JOB_SIZE {
                        arrival.job_size_estimate_ns = 0.0;
                    }
                    let is_innocent = arrival.class == TrafficClass::Innocent;

                    // An idle server implies an empty queue; serve directly.
                    if !self.server.is_busy() {
                        debug_assert!(self.queue.is_empty());
                        self.server.schedule(next_arrival_time, arrival)?;
                    } else {
                        self.queue.push(arrival)?;
                    }
                    steady_state_ns = next_arrival_time;

                    if is_innocent {
                        num_innocent_arrivals += 1;
                    }
                    num_arrivals += 1;
                }
            }
            // Simulate a departure
            else {
                let departure = self.server.record_departure()?;
                if departure.class == TrafficClass::Innocent {
                    total_jsize_i += departure.job_size_actual_ns;
                    total_psize_i += u64::from(departure.packet_size_bits);
                    maximum_jsize_i = maximum_jsize_i.max(departure.job_size_actual_ns);
                    maximum_psize_i = maximum_psize_i.max(departure.packet_size_bits);
                    last_depart_time_i = departure.depart_time_ns;
                    last_arrive_time_i = last_arrive_time_i.max(departure.arrive_time_ns);

                    if is_steady_state {
                        ss_total_psize_i = total_psize_i;
                    }
                    if let Some(packets) = logged_packets.as_mut() {
                        packets.push(departure);
                    }
                }
                // Keep the server busy while the queue has backlog.
                if !self.queue.is_empty() {
                    let next = self.queue.pop()?;
                    self.server.schedule(next_departure_time, next)?;
                }
                num_departures += 1;
            }

            more_arrivals =
                self.tg_innocent.has_new_arrival() && num_innocent_arrivals < self.max_num_arrivals;
        }
        // Sanity checks
        assert!(self.queue.is_empty());
        assert!(!self.server.is_busy());

        if num_innocent_arrivals == 0 {
            return Err(SimError::Config(
                "simulation produced no innocent arrivals".into(),
            ));
        }

        // Compute performance metrics
        let average_psize_i = total_psize_i / num_innocent_arrivals;
        let average_jsize_i = total_jsize_i / num_innocent_arrivals as f64;
        let service_rate_gbps = average_psize_i as f64 / average_jsize_i;
        let input_rate_gbps = total_psize_i as f64 / last_arrive_time_i;
        let input_rate_gbps_attack = self.tg_attack.calibrated_rate_bps()? / BITS_PER_GB;

        let average_goodput_gbps = total_psize_i as f64 / last_depart_time_i;
        let steady_state_goodput_gbps = ss_total_psize_i as f64 / steady_state_ns;

        let mut displacement_factor = 0.0;
        if input_rate_gbps_attack != 0.0 {
            displacement_factor = DISPLACEMENT_EPSILON;
            // Thresholding keeps the factor quiet for small attack rates.
            let goodput_loss = input_rate_gbps - steady_state_goodput_gbps;
            if goodput_loss / input_rate_gbps > DISPLACEMENT_LOSS_THRESHOLD {
                displacement_factor = goodput_loss / input_rate_gbps_attack;
            }
        }

        let report = SimulationReport {
            average_psize_bits: average_psize_i,
            maximum_psize_bits: maximum_psize_i,
            average_jsize_ns: average_jsize_i,
            maximum_jsize_ns: maximum_jsize_i,
            num_innocent_arrivals,
            num_arrivals,
            service_rate_gbps,
            input_rate_gbps,
            average_goodput_gbps,
            steady_state_goodput_gbps,
            displacement_factor,
        };
        if verbose {
            print_results(&report);
        }

        // The packet log is ordered by departure time.
        if let (Some(path), Some(packets)) = (packets_path, logged_packets) {
            write_packet_log(path, &packets)?;
        }
        self.done = true;
        Ok(report)
    }
}

fn print_results(report: &SimulationReport) {
    println!("==========================================");
    println!("            Simulation Results            ");
    println!("==========================================");
    println!("Maximum service rate: {:.2} Gbps", report.service_rate_gbps);
    println!("Innocent packet rate: {:.2} Gbps", report.input_rate_gbps);
    println!("Average packet size: {} bits", report.average_psize_bits);
    println!("Maximum packet size: {} bits", report.maximum_psize_bits);
    println!("Average job size: {:.2} ns", report.average_jsize_ns);
    println!("Maximum job size: {:.2} ns", report.maximum_jsize_ns);
    println!("Innocent arrivals: {}", report.num_innocent_arrivals);
    println!("Total arrivals: {}", report.num_arrivals);
    println!();
    println!("Average goodput: {:.4} Gbps", report.average_goodput_gbps);
    println!(
        "Steady-state goodput: {:.4} Gbps",
        report.steady_state_goodput_gbps
    );
    println!(
        "Steady-state displacement factor: {:.4}",
        report.displacement_factor
    );
    println!();
}

/// Write departed innocent packets as semicolon-separated records:
/// `arrive;depart;flow_id;class;psize_bits;jsize_estimate;jsize_actual`.
fn write_packet_log(path: &Path, packets: &[Packet]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for packet in packets {
        writeln!(
            out,
            "{:.2};{:.2};{};{};{};{:.2};{:.2}",
            packet.arrive_time_ns,
            packet.depart_time_ns,
            packet.flow_id,
            packet.class.tag(),
            packet.packet_size_bits,
            packet.job_size_estimate_ns,
            packet.job_size_actual_ns,
        )?;
    }
    out.flush()?;
    Ok(())
}
