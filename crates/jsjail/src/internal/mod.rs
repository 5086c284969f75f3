pub mod bridge;
pub mod isolate;
pub mod serde;
