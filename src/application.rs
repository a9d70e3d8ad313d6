//! Applications: transform a packet into an estimated and an actual job size.
//!
//! The simulator stamps the estimate *before* queueing and the actual size at
//! the same point (service is non-preemptive, so the actual can be fixed on
//! arrival). For `tcp_reassembly` in oracle mode the estimator is stateful:
//! it performs the real reassembly work up front, which is only sound when
//! the queue guarantees per-flow FIFO service. The server enforces that
//! pairing at construction.

use crate::config::AppConfig;
use crate::distributions::Distribution;
use crate::error::{Result, SimError};
use crate::packet::{Packet, TrafficClass, INVALID_JOB_SIZE};
use crate::tcp_reassembly::TcpReassembly;

/// Parameters shared by every application.
#[derive(Debug, Clone, Copy)]
pub struct AppParams {
    /// Estimate job sizes heuristically (`tcp_reassembly` only).
    pub use_heuristic: bool,
    /// Service-time scale factor: multiplier from application service time to
    /// job size in nanoseconds.
    pub service_time_scale: f64,
    /// Maximum job size (in ns) the attacker is assumed to use.
    pub max_attack_job_size_ns: f64,
}

#[derive(Debug)]
enum AppVariant {
    Echo,
    IidJobSizes { jsize_dist: Distribution },
    TcpReassembly { engine: TcpReassembly },
}

/// The closed family of applications.
#[derive(Debug)]
pub struct Application {
    params: AppParams,
    variant: AppVariant,
}

impl Application {
    /// A simple echo application: innocent packets use the trace-specified
    /// job size.
    pub fn echo(params: AppParams) -> Application {
        Application {
            params,
            variant: AppVariant::Echo,
        }
    }

    /// Innocent job sizes drawn i.i.d. from a user-specified distribution.
    pub fn iid_job_sizes(params: AppParams, jsize_dist: Distribution) -> Application {
        Application {
            params,
            variant: AppVariant::IidJobSizes { jsize_dist },
        }
    }

    /// TCP reassembly: job size reflects the flow's out-of-order state.
    pub fn tcp_reassembly(params: AppParams) -> Application {
        Application {
            params,
            variant: AppVariant::TcpReassembly {
                engine: TcpReassembly::new(),
            },
        }
    }

    /// Instantiate the application named in the configuration.
    pub fn from_config(config: &AppConfig) -> Result<Application> {
        let params = AppParams {
            use_heuristic: config.heuristic,
            service_time_scale: config.stsf,
            max_attack_job_size_ns: config.max_attack_job_size_ns,
        };
        match config.kind.as_str() {
            "echo" => Ok(Application::echo(params)),
            "iid_job_sizes" => {
                let dist_config = config.job_size_ns_dist.as_ref().ok_or_else(|| {
                    SimError::Config(
                        "must specify 'job_size_ns_dist' for the iid_job_sizes application".into(),
                    )
                })?;
                Ok(Application::iid_job_sizes(params, dist_config.build()?))
            }
            "tcp_reassembly" => Ok(Application::tcp_reassembly(params)),
            other => Err(SimError::Config(format!("unknown application type: {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.variant {
            AppVariant::Echo => "echo",
            AppVariant::IidJobSizes { .. } => "iid_job_sizes",
            AppVariant::TcpReassembly { .. } => "tcp_reassembly",
        }
    }

    pub fn params(&self) -> &AppParams {
        &self.params
    }

    /// Whether correct operation requires the queue to preserve per-flow
    /// arrival order.
    pub fn flow_order_required(&self) -> bool {
        matches!(self.variant, AppVariant::TcpReassembly { .. })
    }

    /// Convert a context-dependent service time to a job size in ns.
    fn to_job_size_ns(&self, service_time: f64) -> f64 {
        if service_time == INVALID_JOB_SIZE {
            return INVALID_JOB_SIZE;
        }
        service_time * self.params.service_time_scale
    }

    /// Estimated job size, computed before the packet is queued.
    ///
    /// Must be called exactly once per packet, before `process`: in oracle
    /// mode (`use_heuristic = false`) the TCP estimator mutates flow state
    /// here.
    pub fn job_size_estimate(&mut self, packet: &Packet) -> f64 {
        // Attack traffic carries its job size on the packet.
        if packet.class == TrafficClass::Attack {
            debug_assert!(packet.job_size_estimate_ns >= 0.0);
            return packet.job_size_estimate_ns;
        }
        match &mut self.variant {
            AppVariant::Echo => {
                debug_assert!(packet.job_size_estimate_ns >= 0.0);
                packet.job_size_estimate_ns
            }
            AppVariant::IidJobSizes { jsize_dist } => jsize_dist.sample(),
            AppVariant::TcpReassembly { engine } => {
                debug_assert_eq!(packet.job_size_estimate_ns, INVALID_JOB_SIZE);
                let update = !self.params.use_heuristic;
                let service_time = engine.process_internal(packet, update);
                self.to_job_size_ns(service_time)
            }
        }
    }

    /// Actual job size, fixed at service time.
    ///
    /// The simulator stamps the estimate onto the packet before invoking
    /// this, so variants that echo the estimate read it off the packet.
    pub fn process(&mut self, packet: &Packet) -> f64 {
        if packet.class == TrafficClass::Attack {
            debug_assert!(packet.job_size_actual_ns >= 0.0);
            return packet.job_size_actual_ns;
        }
        match &mut self.variant {
            AppVariant::Echo => packet.job_size_estimate_ns,
            AppVariant::IidJobSizes { .. } => {
                debug_assert!(packet.job_size_estimate_ns >= 0.0);
                packet.job_size_estimate_ns
            }
            AppVariant::TcpReassembly { engine } => {
                if self.params.use_heuristic {
                    let service_time = engine.process_internal(packet, true);
                    self.to_job_size_ns(service_time)
                } else {
                    // Oracle mode: the work was done during estimation.
                    packet.job_size_estimate_ns
                }
            }
        }
    }

    /// Configuration banner fragment.
    pub fn describe(&self) -> String {
        format!(
            "{{\n\ttype = {},\n\tstsf = {:.2},\n\tuse_heuristic = {},\n\tmax_attack_job_size_ns = {}\n}}",
            self.name(),
            self.params.service_time_scale,
            self.params.use_heuristic,
            self.params.max_attack_job_size_ns,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{FlowId, TcpHeader};
    use crate::tcp_reassembly::{COST_BASE, COST_PER_TRAVERSAL};

    fn params() -> AppParams {
        AppParams {
            use_heuristic: false,
            service_time_scale: 1.0,
            max_attack_job_size_ns: 10_000.0,
        }
    }

    fn innocent(est: f64) -> Packet {
        let mut p = Packet::new(0, FlowId::from_raw(1), TrafficClass::Innocent, 512);
        p.job_size_estimate_ns = est;
        p
    }

    fn attack(jsize: f64) -> Packet {
        let mut p = Packet::new(0, FlowId::from_raw(9), TrafficClass::Attack, 512);
        p.job_size_estimate_ns = jsize;
        p.job_size_actual_ns = jsize;
        p
    }

    fn data_segment(flow: u32, psn: u32, next_psn: u32) -> Packet {
        let mut p = Packet::new(0, FlowId::from_raw(flow), TrafficClass::Innocent, 512);
        p.tcp_header = TcpHeader::new(true, false, false, false, psn, next_psn);
        p
    }

    fn syn_segment(flow: u32, next_psn: u32) -> Packet {
        let mut p = Packet::new(0, FlowId::from_raw(flow), TrafficClass::Innocent, 512);
        p.tcp_header = TcpHeader::new(true, true, false, false, next_psn - 1, next_psn);
        p
    }

    #[test]
    fn echo_returns_the_packet_job_size() {
        let mut app = Application::echo(params());
        let p = innocent(750.0);
        assert_eq!(app.job_size_estimate(&p), 750.0);
        assert_eq!(app.process(&p), 750.0);
        assert!(!app.flow_order_required());
    }

    #[test]
    fn attack_job_sizes_pass_through_every_application() {
        let p = attack(10_000.0);
        let mut echo = Application::echo(params());
        assert_eq!(echo.job_size_estimate(&p), 10_000.0);
        assert_eq!(echo.process(&p), 10_000.0);

        let mut tcp = Application::tcp_reassembly(params());
        assert_eq!(tcp.job_size_estimate(&p), 10_000.0);
        assert_eq!(tcp.process(&p), 10_000.0);
    }

    #[test]
    fn iid_actual_echoes_the_stamped_estimate() {
        let dist = Distribution::constant(420.0);
        let mut app = Application::iid_job_sizes(params(), dist);
        let mut p = innocent(INVALID_JOB_SIZE);
        let est = app.job_size_estimate(&p);
        assert_eq!(est, 420.0);
        p.job_size_estimate_ns = est;
        assert_eq!(app.process(&p), 420.0);
    }

    #[test]
    fn tcp_oracle_mode_estimates_eagerly_and_echoes_at_service() {
        let mut app = Application::tcp_reassembly(params());
        assert!(app.flow_order_required());

        assert_eq!(app.job_size_estimate(&syn_segment(1, 100)), INVALID_JOB_SIZE);
        let mut ooo = data_segment(1, 200, 300);
        let est = app.job_size_estimate(&ooo);
        assert_eq!(est, f64::from(COST_BASE));
        ooo.job_size_estimate_ns = est;
        assert_eq!(app.process(&ooo), est);
    }

    #[test]
    fn tcp_heuristic_mode_defers_the_real_work_to_service_time() {
        let heuristic = AppParams {
            use_heuristic: true,
            ..params()
        };
        let mut app = Application::tcp_reassembly(heuristic);

        // SYN seen at estimation time has no effect (no update); the flow is
        // created when the SYN is serviced.
        assert_eq!(app.job_size_estimate(&syn_segment(1, 100)), INVALID_JOB_SIZE);
        assert_eq!(app.process(&syn_segment(1, 100)), INVALID_JOB_SIZE);

        let ooo = data_segment(1, 200, 300);
        // Estimation peeks at the (empty) OOO list without mutating.
        assert_eq!(app.job_size_estimate(&ooo), f64::from(COST_BASE));
        // Service performs the insertion.
        assert_eq!(app.process(&ooo), f64::from(COST_BASE));
        // A later estimate now sees one pending interval.
        let next = data_segment(1, 400, 500);
        assert_eq!(
            app.job_size_estimate(&next),
            f64::from(COST_BASE + COST_PER_TRAVERSAL)
        );
    }

    #[test]
    fn stsf_scales_reassembly_job_sizes() {
        let scaled = AppParams {
            service_time_scale: 2.5,
            ..params()
        };
        let mut app = Application::tcp_reassembly(scaled);
        app.job_size_estimate(&syn_segment(1, 100));
        let est = app.job_size_estimate(&data_segment(1, 200, 300));
        assert_eq!(est, 2.5 * f64::from(COST_BASE));
    }

    #[test]
    fn unknown_application_type_is_a_config_error() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "type": "transcode", "stsf": 1.0, "max_attack_job_size_ns": 1.0 }"#,
        )
        .unwrap();
        assert!(Application::from_config(&config).is_err());
    }
}
