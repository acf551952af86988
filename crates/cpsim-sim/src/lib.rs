//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Long-running processes exercised by the harness.
//!
//! Both processes read and write the store only through [`StoreClients`],
//! poll it on their configured sync interval, and stop when their shutdown
//! channel fires.
//!
//! [`StoreClients`]: cpsim_store::StoreClients

pub mod agent;
pub mod collaborators;
pub mod controller;
pub mod datapath;
pub mod discovery;
pub mod process;
pub mod readiness;

pub use agent::{start_agent, AgentContext, AgentHandle};
pub use collaborators::{Collaborators, DnsProxy, MockDnsProxy};
pub use controller::{start_controller, ControllerContext, ControllerHandle};
pub use datapath::{BackendSource, FakeDatapath, LocalNode, ServiceFrontend};
pub use discovery::Discovery;
pub use process::{ProcessHandle, ProcessKind};
pub use readiness::Readiness;
