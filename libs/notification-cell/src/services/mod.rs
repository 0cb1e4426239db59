pub mod email;
pub mod notifier;
pub mod realtime;
pub mod store;

pub use email::*;
pub use notifier::*;
pub use realtime::*;
pub use store::*;
