//! Command implementations.

pub mod evaluate;
pub mod extract;
pub mod memory;

pub use self::evaluate::execute_evaluate;
pub use self::extract::execute_extract;
pub use self::memory::execute_memory;
