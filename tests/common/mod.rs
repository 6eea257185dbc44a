pub mod builders;
pub mod harness;
pub mod mock_trigger;
pub mod strategies;

pub use builders::*;
pub use harness::*;
pub use mock_trigger::*;
