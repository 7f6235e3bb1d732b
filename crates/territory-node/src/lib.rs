//! Territory Node
//!
//! Hosts the authoritative claim ledger and replicates it to map viewers
//! over UDP. Operators mutate the ledger through a stdin console.

pub mod chunk;
pub mod config;
pub mod console;
pub mod node;
pub mod viewers;

pub use chunk::{split_frame, FrameAssembler, FrameTooLarge, DEFAULT_CHUNK_PAYLOAD};
pub use config::NodeConfig;
pub use node::TerritoryNode;
pub use viewers::{dispatch, UdpViewers, ViewerDatagram, ViewerEvent, ViewerRegistry};
