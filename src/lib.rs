pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fdlimit;
pub mod frame;
pub mod hash;
pub mod io;
pub mod join;
pub mod partition;
pub mod progress;
pub mod record;
pub mod select;
pub mod sort;
pub mod util;
pub mod writer_pool;

#[cfg(feature = "s3")]
pub mod s3;

pub use crate::config::{JoinOptions, PartitionOptions};
pub use crate::dispatch::{run_join, JoinRunOptions};
pub use crate::error::DiskJoinError;
pub use crate::frame::{Manifest, PartitionedFrame, Shard};
pub use crate::partition::{partition, PartitionRunOptions};
pub use crate::progress::{set_global_multiprogress, ProgressScope};
pub use crate::record::{Record, Schema, Value};
pub use crate::select::{default_select, resolve_select, FrameFields, SelectPlan};
pub use crate::util::init_tracing_once;
