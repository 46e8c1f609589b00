pub mod config;
pub mod error;

pub mod memory {
    pub mod allocator;
    pub mod block;
    pub mod defrag;
    pub mod fit;
    pub mod ledger;
    pub mod stats;
}

pub mod sched {
    pub mod process;
    pub mod registry;
    pub mod simulation;
    pub mod snapshot;
}

pub mod net {
    pub mod client;
    pub mod server;
}

pub mod cli {
    pub mod shell;
    pub mod utils;
}

pub use config::Config;
pub use error::{SimError, SimResult};
pub use memory::fit::FitStrategy;
pub use sched::{process::ProcessSpec, simulation::Simulation, snapshot::Snapshot};
