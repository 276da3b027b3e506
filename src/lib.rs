pub mod ai;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod entity;
pub mod error;
pub mod storage;
pub mod sync;

pub use config::BoardConfig;
pub use error::{BoardError, Result};
pub use storage::{LoroStore, RemoteStore, StorePath};
pub use sync::{TopicBoardSync, WhiteboardSync};
