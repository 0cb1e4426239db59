pub mod booking;
pub mod lifecycle;
pub mod overlap;
pub mod probe;
pub mod store;

pub use booking::*;
pub use lifecycle::*;
pub use overlap::*;
pub use probe::*;
pub use store::*;
