pub mod auction;
pub mod commitment;
pub mod escrow;
pub mod hashlock;
pub mod message;
pub mod order;
pub mod verification;

pub use auction::*;
pub use commitment::*;
pub use escrow::*;
pub use hashlock::*;
pub use message::*;
pub use order::*;
pub use verification::*;

pub const PROTOCOL_VERSION: &str = "1.0";
