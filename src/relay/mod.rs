//! Message relay
//!
//! Classification of inbound payloads, caption handling and room fan-out.
//! Nothing here can fail: malformed input is relayed as opaque and
//! unreachable peers are skipped.

pub mod broadcast;
pub mod message;
pub mod router;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use message::{CaptionEvent, RelayMessage};
pub use router::{MessageRouter, RouteOutcome};
