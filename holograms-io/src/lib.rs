//! # Holograms IO
//!
//! The connection-layer boundary.
//! Everything the rendering engine needs from the world engine lives here:
//! where viewers are, what they may see, and how entity operations reach them.
//! Wire encoding stays behind [`Transport`]; nothing in this crate knows a byte layout.

pub mod location;
pub mod recording;
pub mod transport;
pub mod version;
pub mod viewer;

pub use location::Location;
pub use recording::{RecordedOp, RecordingTransport};
pub use transport::{
    ChannelTransport, EntityId, EntityIdAllocator, EntityKind, EntityMetadata, EntityOp,
    EntitySpawn, ItemStack, OutboundPacket, Transport, TransportError,
};
pub use version::{ProtocolVersion, UnknownVersion};
pub use viewer::{Viewer, ViewerDirectory, ViewerEvent, ViewerId, ViewerRegistry};
