//! Test doubles for the job data path.
//!
//! Everything here stands in for a worker process at one end of a pipe:
//!
//! - **Sinks**: [`RecordingSink`] captures each write a router makes and can be
//!   switched into a failing mode
//! - **Readers**: [`ChunkedReader`] hands a decoder its bytes in a fixed chunk
//!   plan, to exercise documents split across reads
//! - **Mock I/O**: temporary files holding a worker's output stream, or
//!   acting as file-backed sinks
//! - **Assertions**: decoding and comparing length-encoded records
//!
//! # Quick Start
//!
//! ```
//! use jobflow::router::PartitionRouter;
//! use jobflow::testing::RecordingSink;
//!
//! # fn main() -> anyhow::Result<()> {
//! let sinks = vec![RecordingSink::new(), RecordingSink::new()];
//! let mut router = PartitionRouter::new(sinks.clone())?;
//! let route = router.route_to_job("host-1", b"payload")?;
//! router.flush()?;
//! assert_eq!(sinks[route].bytes(), b"payload");
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod mock_io;
pub mod readers;
pub mod sinks;

pub use assertions::*;
pub use mock_io::*;
pub use readers::*;
pub use sinks::*;
