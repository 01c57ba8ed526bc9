// crates/core/src/lib.rs
pub mod activity;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod runner;
pub mod session;
pub mod summary;
pub mod turn;

pub use activity::*;
pub use envelope::*;
pub use error::*;
pub use metadata::*;
pub use runner::*;
pub use session::*;
pub use turn::*;
