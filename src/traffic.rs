//! Traffic generators: timestamped packet arrivals, synthetic or trace-driven.
//!
//! Generators expose the arrival time of their next packet but advance that
//! clock only when asked: the simulator skips the advance for packets whose
//! actual job size is invalid, so a SYN shares its timestamp with the first
//! data segment that follows it in a trace.
//!
//! A generator is *calibrated* once its bit-rate and average packet size are
//! known. Trace-driven workloads only learn their average packet size from a
//! full pass over the trace, so their first run is a calibration dry run.

use crate::config::TrafficConfig;
use crate::distributions::Distribution;
use crate::error::{Result, SimError};
use crate::packet::{FlowId, Packet, TcpHeader, TrafficClass, BITS_PER_BYTE, NANOSECS_PER_SEC};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use tracing::warn;

/// Inter-arrival time used while a generator is uncalibrated (dry runs).
pub const DRY_RUN_IAT_NS: f64 = 1000.0;

fn approx_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Synthetic generator for innocent traffic: packet sizes drawn from a
/// distribution, flow ids assigned round-robin.
#[derive(Debug)]
pub struct InnocentGenerator {
    iat_dist: Distribution,
    psize_dist: Distribution,
    num_flows: u32,
    next_flow_id: u32,
    arrival_time: f64,
    is_calibrated: bool,
}

impl InnocentGenerator {
    pub fn new(num_flows: u32, iat_dist: Distribution, psize_dist: Distribution) -> InnocentGenerator {
        InnocentGenerator {
            iat_dist,
            psize_dist,
            num_flows,
            next_flow_id: 0,
            arrival_time: 0.0,
            is_calibrated: false,
        }
    }

    fn rate_bps(&self) -> f64 {
        // E[P] / E[T] with P in bits and T in ns.
        self.psize_dist.stats().mean * NANOSECS_PER_SEC / self.iat_dist.stats().mean
    }

    fn next_arrival(&mut self, packet_idx: u64) -> Packet {
        let flow_id = FlowId::from_raw(self.next_flow_id);
        self.next_flow_id += 1;
        if self.next_flow_id == self.num_flows {
            self.next_flow_id = 0;
        }
        let psize = self.psize_dist.sample() as u32;
        Packet::new(packet_idx, flow_id, TrafficClass::Innocent, psize)
    }

    fn calibrate(&mut self, rate_bps: f64) -> Result<()> {
        if self.is_calibrated {
            return Err(SimError::Calibration(
                "traffic generator was already calibrated".into(),
            ));
        }
        if !approx_equal(rate_bps, self.rate_bps()) {
            return Err(SimError::Calibration(
                "calibration failed, check the computed rate".into(),
            ));
        }
        self.is_calibrated = true;
        Ok(())
    }
}

/// Synthetic generator for adversarial traffic: fixed packet and job sizes,
/// flow ids offset past the innocent flows, job sizes encoded on the packet.
#[derive(Debug)]
pub struct AttackGenerator {
    iat_dist: Distribution,
    num_flows: u32,
    flow_id_offset: u32,
    packet_size_bits: u32,
    job_size_ns: f64,
    next_flow_id: u32,
    arrival_time: f64,
    is_calibrated: bool,
}

impl AttackGenerator {
    pub fn new(
        num_flows: u32,
        flow_id_offset: u32,
        iat_dist: Distribution,
        packet_size_bits: u32,
        job_size_ns: f64,
    ) -> AttackGenerator {
        // Zero attack bandwidth: the generator never produces an arrival.
        let arrival_time = if iat_dist.stats().mean.is_infinite() {
            f64::INFINITY
        } else {
            0.0
        };
        AttackGenerator {
            iat_dist,
            num_flows,
            flow_id_offset,
            packet_size_bits,
            job_size_ns,
            next_flow_id: 0,
            arrival_time,
            is_calibrated: false,
        }
    }

    /// The no-attack generator used when `attack_traffic` is not configured.
    pub fn disabled() -> AttackGenerator {
        let mut tg = AttackGenerator::new(0, 0, Distribution::constant(f64::INFINITY), 0, -1.0);
        tg.is_calibrated = true;
        tg
    }

    fn rate_bps(&self) -> f64 {
        f64::from(self.packet_size_bits) * NANOSECS_PER_SEC / self.iat_dist.stats().mean
    }

    fn next_arrival(&mut self, packet_idx: u64) -> Packet {
        let flow_id = FlowId::from_raw(self.flow_id_offset + self.next_flow_id);
        self.next_flow_id += 1;
        if self.next_flow_id == self.num_flows {
            self.next_flow_id = 0;
        }
        let mut packet = Packet::new(
            packet_idx,
            flow_id,
            TrafficClass::Attack,
            self.packet_size_bits,
        );
        packet.job_size_estimate_ns = self.job_size_ns;
        packet.job_size_actual_ns = self.job_size_ns;
        packet
    }

    fn calibrate(&mut self, rate_bps: f64) -> Result<()> {
        if self.is_calibrated {
            return Err(SimError::Calibration(
                "traffic generator was already calibrated".into(),
            ));
        }
        let computed = if rate_bps == 0.0 { 0.0 } else { self.rate_bps() };
        if !approx_equal(rate_bps, computed) {
            return Err(SimError::Calibration(
                "calibration failed, check the computed rate".into(),
            ));
        }
        self.is_calibrated = true;
        Ok(())
    }
}

/// Trace-driven generator for innocent traffic.
///
/// The trace is CSV, one packet per line, at least nine fields:
/// `eth_size_bytes, src_ip_hex, dst_ip_hex, src_port_hex, dst_port_hex,
/// is_tcp, tcp_flags, psn, next_psn [, job_size_ns]`, where the flags encode
/// `(syn << 2) | (fin << 1) | rst`.
#[derive(Debug)]
pub struct TraceGenerator {
    trace_path: PathBuf,
    iat_dist: Distribution,
    reader: BufReader<File>,
    /// One-line lookahead so `has_new_arrival` is cheap.
    pending_line: Option<String>,
    line_no: u64,
    avg_psize_bits: Option<f64>,
    arrival_time: f64,
}

impl TraceGenerator {
    pub fn new(trace_path: PathBuf, iat_dist: Distribution) -> Result<TraceGenerator> {
        let file = File::open(&trace_path)?;
        let mut tg = TraceGenerator {
            trace_path,
            iat_dist,
            reader: BufReader::new(file),
            pending_line: None,
            line_no: 0,
            avg_psize_bits: None,
            arrival_time: 0.0,
        };
        tg.fill_lookahead()?;
        Ok(tg)
    }

    fn fill_lookahead(&mut self) -> Result<()> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        self.pending_line = if n == 0 {
            None
        } else {
            Some(line.trim_end_matches(['\n', '\r']).to_string())
        };
        Ok(())
    }

    fn rate_bps(&self) -> f64 {
        self.avg_psize_bits.unwrap_or(f64::NAN) * NANOSECS_PER_SEC / self.iat_dist.stats().mean
    }

    fn parse_error(&self, reason: impl Into<String>) -> SimError {
        SimError::TraceParse {
            line: self.line_no,
            reason: reason.into(),
        }
    }

    fn next_arrival(&mut self, packet_idx: u64) -> Result<Packet> {
        let line = self
            .pending_line
            .take()
            .expect("next_arrival requires has_new_arrival");
        self.line_no += 1;

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 9 {
            return Err(self.parse_error(format!("expected >= 9 fields, got {}", fields.len())));
        }
        let eth_size_bytes: u32 = fields[0]
            .parse()
            .map_err(|e| self.parse_error(format!("bad packet size '{}': {e}", fields[0])))?;
        let src_ip = u32::from_str_radix(fields[1], 16)
            .map_err(|e| self.parse_error(format!("bad src ip '{}': {e}", fields[1])))?;
        let dst_ip = u32::from_str_radix(fields[2], 16)
            .map_err(|e| self.parse_error(format!("bad dst ip '{}': {e}", fields[2])))?;
        let src_port = u16::from_str_radix(fields[3], 16)
            .map_err(|e| self.parse_error(format!("bad src port '{}': {e}", fields[3])))?;
        let dst_port = u16::from_str_radix(fields[4], 16)
            .map_err(|e| self.parse_error(format!("bad dst port '{}': {e}", fields[4])))?;
        let is_tcp = fields[5]
            .parse::<i32>()
            .map_err(|e| self.parse_error(format!("bad is_tcp '{}': {e}", fields[5])))?
            == 1;

        let flow_id = FlowId::new(src_ip, dst_ip, src_port, dst_port);
        let psize_bits = eth_size_bytes * BITS_PER_BYTE;
        let mut packet = Packet::new(packet_idx, flow_id, TrafficClass::Innocent, psize_bits);

        if is_tcp {
            let flags: u32 = fields[6]
                .parse()
                .map_err(|e| self.parse_error(format!("bad tcp flags '{}': {e}", fields[6])))?;
            let psn: u32 = fields[7]
                .parse()
                .map_err(|e| self.parse_error(format!("bad psn '{}': {e}", fields[7])))?;
            let next_psn: u32 = fields[8]
                .parse()
                .map_err(|e| self.parse_error(format!("bad next psn '{}': {e}", fields[8])))?;
            packet.tcp_header = TcpHeader::new(
                true,
                (flags >> 2) & 0x1 == 1,
                (flags >> 1) & 0x1 == 1,
                flags & 0x1 == 1,
                psn,
                next_psn,
            );
        }
        // An optional tenth field overrides the job-size estimate.
        if fields.len() > 9 && !fields[9].is_empty() {
            packet.job_size_estimate_ns = fields[9]
                .parse()
                .map_err(|e| self.parse_error(format!("bad job size '{}': {e}", fields[9])))?;
        }
        self.fill_lookahead()?;
        Ok(packet)
    }

    fn reset(&mut self) -> Result<()> {
        self.arrival_time = 0.0;
        self.line_no = 0;
        self.reader.seek(SeekFrom::Start(0))?;
        self.fill_lookahead()
    }

    fn calibrate(&mut self, avg_psize_bits: f64) -> Result<()> {
        if self.avg_psize_bits.is_some() {
            return Err(SimError::Calibration(
                "traffic generator was already calibrated".into(),
            ));
        }
        self.avg_psize_bits = Some(avg_psize_bits);
        Ok(())
    }
}

/// The closed family of traffic generators.
#[derive(Debug)]
pub enum TrafficGenerator {
    Innocent(InnocentGenerator),
    Attack(AttackGenerator),
    Trace(TraceGenerator),
}

impl TrafficGenerator {
    /// Instantiate the generator described by a `innocent_traffic` /
    /// `attack_traffic` config section. `flow_id_offset` displaces attack
    /// flow ids past the innocent ones.
    pub fn from_config(
        is_dry_run: bool,
        class: TrafficClass,
        config: &TrafficConfig,
        flow_id_offset: u32,
    ) -> Result<TrafficGenerator> {
        let tg = match config {
            TrafficConfig::Trace {
                trace_fp,
                rate_bps,
                average_packet_size_bits,
            } => {
                if class == TrafficClass::Attack {
                    return Err(SimError::Config(
                        "adversarial traffic generators must be synthetic (not trace-driven)"
                            .into(),
                    ));
                }
                // With both the average packet size and the rate known the
                // generator can be calibrated; otherwise this is a dry run.
                let mut iat_ns = DRY_RUN_IAT_NS;
                let mut calibrated_psize = None;
                if let (Some(avg_psize), Some(rate)) = (average_packet_size_bits, rate_bps) {
                    if !is_dry_run {
                        iat_ns = NANOSECS_PER_SEC * avg_psize / rate;
                        calibrated_psize = Some(*avg_psize);
                    }
                }
                let mut tg =
                    TraceGenerator::new(PathBuf::from(trace_fp), Distribution::constant(iat_ns))?;
                if let Some(avg_psize) = calibrated_psize {
                    tg.calibrate(avg_psize)?;
                }
                TrafficGenerator::Trace(tg)
            }
            TrafficConfig::Synthetic {
                rate_bps,
                num_flows,
                packet_size_bits_dist,
                packet_size_bits,
                job_size_ns,
            } => match class {
                TrafficClass::Innocent => {
                    let psize_config = packet_size_bits_dist.as_ref().ok_or_else(|| {
                        SimError::Config(
                            "must specify 'packet_size_bits_dist' for synthetic traffic generators"
                                .into(),
                        )
                    })?;
                    let psize_dist = psize_config.build()?;
                    let avg_psize = psize_dist.stats().mean;

                    let mut iat_ns = DRY_RUN_IAT_NS;
                    let mut calibrated_rate = None;
                    if let Some(rate) = rate_bps {
                        if !is_dry_run {
                            iat_ns = NANOSECS_PER_SEC * avg_psize / rate;
                            calibrated_rate = Some(*rate);
                        }
                    }
                    let mut tg = InnocentGenerator::new(
                        *num_flows,
                        Distribution::constant(iat_ns),
                        psize_dist,
                    );
                    if let Some(rate) = calibrated_rate {
                        tg.calibrate(rate)?;
                    }
                    TrafficGenerator::Innocent(tg)
                }
                TrafficClass::Attack => {
                    let rate = rate_bps.unwrap_or(0.0);
                    let mut iat_ns = f64::INFINITY;
                    let mut psize_bits = 0;
                    let mut jsize_ns = -1.0;
                    if rate > 0.0 && !is_dry_run {
                        jsize_ns = job_size_ns.ok_or_else(|| {
                            SimError::Config(
                                "must specify 'job_size_ns' for attack traffic generators when \
                                 not running in dry-run mode"
                                    .into(),
                            )
                        })?;
                        psize_bits = packet_size_bits.ok_or_else(|| {
                            SimError::Config(
                                "must specify 'packet_size_bits' for attack traffic generators \
                                 when not running in dry-run mode"
                                    .into(),
                            )
                        })?;
                        iat_ns = NANOSECS_PER_SEC * f64::from(psize_bits) / rate;
                    } else if rate > 0.0 {
                        warn!("in dry-run mode with a non-zero adversarial rate; no attack traffic will be generated");
                    }
                    let mut tg = AttackGenerator::new(
                        *num_flows,
                        flow_id_offset,
                        Distribution::constant(iat_ns),
                        psize_bits,
                        jsize_ns,
                    );
                    let calibration_rate = if rate > 0.0 && !is_dry_run { rate } else { 0.0 };
                    tg.calibrate(calibration_rate)?;
                    TrafficGenerator::Attack(tg)
                }
            },
        };
        // A generator may remain uncalibrated only in dry-run mode.
        if !is_dry_run && !tg.is_calibrated() {
            return Err(SimError::Config(
                "traffic generator must be calibrated (have a valid rate and average packet \
                 size) when not running in dry-run mode"
                    .into(),
            ));
        }
        Ok(tg)
    }

    /// The no-attack generator used when `attack_traffic` is not configured.
    pub fn disabled_attack() -> TrafficGenerator {
        TrafficGenerator::Attack(AttackGenerator::disabled())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TrafficGenerator::Innocent(_) | TrafficGenerator::Attack(_) => "synthetic",
            TrafficGenerator::Trace(_) => "trace",
        }
    }

    pub fn is_trace_driven(&self) -> bool {
        matches!(self, TrafficGenerator::Trace(_))
    }

    pub fn num_flows(&self) -> u32 {
        match self {
            TrafficGenerator::Innocent(tg) => tg.num_flows,
            TrafficGenerator::Attack(tg) => tg.num_flows,
            TrafficGenerator::Trace(_) => 0,
        }
    }

    /// Whether the generator can produce another arrival.
    pub fn has_new_arrival(&self) -> bool {
        match self {
            TrafficGenerator::Innocent(_) | TrafficGenerator::Attack(_) => true,
            TrafficGenerator::Trace(tg) => tg.pending_line.is_some(),
        }
    }

    /// Arrival time of the next packet this generator will produce.
    pub fn next_arrival_time(&self) -> f64 {
        match self {
            TrafficGenerator::Innocent(tg) => tg.arrival_time,
            TrafficGenerator::Attack(tg) => tg.arrival_time,
            TrafficGenerator::Trace(tg) => tg.arrival_time,
        }
    }

    /// Advance the arrival clock by one sampled inter-arrival time.
    ///
    /// Called by the simulator only after a packet with a valid job size, so
    /// invalid packets share their timestamp with the next arrival.
    pub fn advance_arrival_time(&mut self) {
        match self {
            TrafficGenerator::Innocent(tg) => tg.arrival_time += tg.iat_dist.sample(),
            TrafficGenerator::Attack(tg) => tg.arrival_time += tg.iat_dist.sample(),
            TrafficGenerator::Trace(tg) => tg.arrival_time += tg.iat_dist.sample(),
        }
    }

    /// Produce the next packet, stamped with the current arrival time.
    pub fn next_arrival(&mut self, packet_idx: u64) -> Result<Packet> {
        let mut packet = match self {
            TrafficGenerator::Innocent(tg) => tg.next_arrival(packet_idx),
            TrafficGenerator::Attack(tg) => tg.next_arrival(packet_idx),
            TrafficGenerator::Trace(tg) => tg.next_arrival(packet_idx)?,
        };
        packet.arrive_time_ns = self.next_arrival_time();
        Ok(packet)
    }

    /// Rewind the generator to its initial state.
    pub fn reset(&mut self) -> Result<()> {
        match self {
            TrafficGenerator::Innocent(tg) => {
                tg.arrival_time = 0.0;
                tg.next_flow_id = 0;
                Ok(())
            }
            TrafficGenerator::Attack(tg) => {
                tg.arrival_time = if tg.iat_dist.stats().mean.is_infinite() {
                    f64::INFINITY
                } else {
                    0.0
                };
                tg.next_flow_id = 0;
                Ok(())
            }
            TrafficGenerator::Trace(tg) => tg.reset(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        match self {
            TrafficGenerator::Innocent(tg) => tg.is_calibrated,
            TrafficGenerator::Attack(tg) => tg.is_calibrated,
            TrafficGenerator::Trace(tg) => tg.avg_psize_bits.is_some(),
        }
    }

    /// Calibrated bit-rate in bits per second.
    pub fn calibrated_rate_bps(&self) -> Result<f64> {
        if !self.is_calibrated() {
            return Err(SimError::Calibration(
                "traffic generator is not calibrated".into(),
            ));
        }
        Ok(match self {
            TrafficGenerator::Innocent(tg) => tg.rate_bps(),
            TrafficGenerator::Attack(tg) => {
                if tg.packet_size_bits == 0 {
                    0.0
                } else {
                    tg.rate_bps()
                }
            }
            TrafficGenerator::Trace(tg) => tg.rate_bps(),
        })
    }

    /// Calibrated average packet size in bits.
    pub fn calibrated_avg_psize_bits(&self) -> Result<f64> {
        if !self.is_calibrated() {
            return Err(SimError::Calibration(
                "traffic generator is not calibrated".into(),
            ));
        }
        Ok(match self {
            TrafficGenerator::Innocent(tg) => tg.psize_dist.stats().mean,
            TrafficGenerator::Attack(tg) => f64::from(tg.packet_size_bits),
            TrafficGenerator::Trace(tg) => tg.avg_psize_bits.unwrap_or(f64::NAN),
        })
    }

    /// Configuration banner fragment.
    pub fn describe(&self) -> String {
        match self {
            TrafficGenerator::Innocent(tg) => {
                let mut out = format!(
                    "{{\n\ttype: synthetic,\n\tiat_ns_dist: {},\n\tpacket_size_bits_dist: {}",
                    tg.iat_dist.describe(),
                    tg.psize_dist.describe()
                );
                if tg.is_calibrated {
                    out.push_str(&format!(",\n\trate: {:.2} bps", tg.rate_bps()));
                }
                out.push_str("\n}");
                out
            }
            TrafficGenerator::Attack(tg) => {
                let mut out = format!(
                    "{{\n\ttype: synthetic,\n\tiat_ns_dist: {}",
                    tg.iat_dist.describe()
                );
                if tg.is_calibrated {
                    out.push_str(&format!(
                        ",\n\tpacket_size_bits: {} bits,\n\tjob_size_ns: {:.2} ns,\n\trate: {:.2} bps",
                        tg.packet_size_bits,
                        tg.job_size_ns,
                        if tg.packet_size_bits == 0 { 0.0 } else { tg.rate_bps() },
                    ));
                }
                out.push_str("\n}");
                out
            }
            TrafficGenerator::Trace(tg) => {
                let mut out = format!(
                    "{{\n\ttype: trace,\n\ttrace: {},\n\tiat_ns_dist: {}",
                    tg.trace_path.display(),
                    tg.iat_dist.describe()
                );
                if let Some(avg) = tg.avg_psize_bits {
                    out.push_str(&format!(
                        ",\n\taverage_packet_size_bits: {avg:.2} bits,\n\trate: {:.2} bps",
                        tg.rate_bps()
                    ));
                }
                out.push_str("\n}");
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scratch trace file removed on drop.
    struct TempTrace {
        path: PathBuf,
    }

    impl TempTrace {
        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TempTrace {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn write_trace(lines: &[&str]) -> TempTrace {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let path = std::env::temp_dir().join(format!(
            "advsched_trace_{}_{}.csv",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        TempTrace { path }
    }

    #[test]
    fn innocent_generator_round_robins_flows() {
        let mut tg = InnocentGenerator::new(
            3,
            Distribution::constant(100.0),
            Distribution::constant(512.0),
        );
        let flows: Vec<u32> = (0..5).map(|i| tg.next_arrival(i).flow_id.src_ip).collect();
        assert_eq!(flows, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn innocent_calibration_verifies_the_rate() {
        // IAT chosen so that rate = 512 bits * 1e9 / iat.
        let rate = 1e9;
        let iat = NANOSECS_PER_SEC * 512.0 / rate;
        let mut tg = InnocentGenerator::new(
            1,
            Distribution::constant(iat),
            Distribution::constant(512.0),
        );
        tg.calibrate(rate).unwrap();
        assert!(tg.is_calibrated);
        assert!(tg.calibrate(rate).is_err());
    }

    #[test]
    fn attack_generator_encodes_job_sizes_and_offsets_flows() {
        let mut tg = AttackGenerator::new(2, 10, Distribution::constant(50.0), 512, 9000.0);
        let p = tg.next_arrival(0);
        assert_eq!(p.class, TrafficClass::Attack);
        assert_eq!(p.flow_id.src_ip, 10);
        assert_eq!(p.job_size_estimate_ns, 9000.0);
        assert_eq!(p.job_size_actual_ns, 9000.0);
        assert_eq!(tg.next_arrival(1).flow_id.src_ip, 11);
    }

    #[test]
    fn disabled_attack_generator_never_arrives() {
        let tg = TrafficGenerator::disabled_attack();
        assert!(tg.next_arrival_time().is_infinite());
        assert!(tg.is_calibrated());
        assert_eq!(tg.calibrated_rate_bps().unwrap(), 0.0);
    }

    #[test]
    fn uncalibrated_rate_query_errors() {
        let tg = TrafficGenerator::Innocent(InnocentGenerator::new(
            1,
            Distribution::constant(DRY_RUN_IAT_NS),
            Distribution::constant(512.0),
        ));
        assert!(matches!(
            tg.calibrated_rate_bps(),
            Err(SimError::Calibration(_))
        ));
    }

    #[test]
    fn trace_generator_parses_packets() {
        let file = write_trace(&[
            "64,0a000001,0a000002,1f90,0050,1,4,100,101",
            "1500,0a000001,0a000002,1f90,0050,1,0,101,1501,2500.5",
            "64,0b000001,0b000002,0001,0002,0,0,0,0",
        ]);
        let mut tg =
            TraceGenerator::new(file.path().to_path_buf(), Distribution::constant(1000.0)).unwrap();

        let syn = tg.next_arrival(0).unwrap();
        assert_eq!(syn.packet_size_bits, 512);
        assert!(syn.tcp_header.valid && syn.tcp_header.syn);
        assert_eq!(syn.tcp_header.seq_range(), (100, 101));

        let data = tg.next_arrival(1).unwrap();
        assert!(!data.tcp_header.syn);
        assert_eq!(data.job_size_estimate_ns, 2500.5);

        let udp = tg.next_arrival(2).unwrap();
        assert!(!udp.tcp_header.valid);

        assert!(tg.pending_line.is_none());
    }

    #[test]
    fn trace_generator_resets_to_the_start() {
        let file = write_trace(&["64,1,2,3,4,0,0,0,0"]);
        let mut generator = TrafficGenerator::Trace(
            TraceGenerator::new(file.path().to_path_buf(), Distribution::constant(1000.0))
                .unwrap(),
        );
        assert!(generator.has_new_arrival());
        generator.next_arrival(0).unwrap();
        assert!(!generator.has_new_arrival());
        generator.reset().unwrap();
        assert!(generator.has_new_arrival());
        let p = generator.next_arrival(0).unwrap();
        assert_eq!(p.packet_size_bits, 512);
    }

    #[test]
    fn malformed_trace_line_names_the_line() {
        let file = write_trace(&["64,1,2,3,4,0,0,0,0", "not-a-number,1,2,3,4,0,0,0,0"]);
        let mut tg =
            TraceGenerator::new(file.path().to_path_buf(), Distribution::constant(1000.0)).unwrap();
        tg.next_arrival(0).unwrap();
        match tg.next_arrival(1) {
            Err(SimError::TraceParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a trace parse error, got {other:?}"),
        }
    }

    #[test]
    fn short_trace_line_is_rejected() {
        let file = write_trace(&["64,1,2,3,4,0"]);
        let mut tg =
            TraceGenerator::new(file.path().to_path_buf(), Distribution::constant(1000.0)).unwrap();
        assert!(matches!(
            tg.next_arrival(0),
            Err(SimError::TraceParse { .. })
        ));
    }

    #[test]
    fn attack_config_must_be_synthetic() {
        let config: TrafficConfig = serde_json::from_str(
            r#"{ "type": "trace", "trace_fp": "/dev/null" }"#,
        )
        .unwrap();
        let err =
            TrafficGenerator::from_config(false, TrafficClass::Attack, &config, 0).unwrap_err();
        assert!(err.to_string().contains("synthetic"));
    }
}
