pub mod assignment;
pub mod blocks;
pub mod store;
pub mod timeline;

pub use assignment::*;
pub use blocks::*;
pub use store::*;
pub use timeline::*;
