pub mod application;
pub mod bounded_heap;
pub mod config;
pub mod distributions;
pub mod error;
pub mod fq_queue;
pub mod heap;
pub mod hffs_queue;
pub mod inorder_queue;
pub mod packet;
pub mod queue;
pub mod server;
pub mod simulator;
pub mod tcp_reassembly;
pub mod traffic;

// Re-export for easier testing
pub use error::SimError;
pub use simulator::{SimulationReport, Simulator};
