// Deadlock Engine Module
// Safety analysis, wait-for graphs, cycle search, recovery, scenario generation

pub mod compatibility;
pub mod cycles;
pub mod recovery;
pub mod safety;
pub mod scenario;
pub mod types;
pub mod wait_for;

pub use compatibility::*;
pub use cycles::*;
pub use recovery::*;
pub use safety::*;
pub use scenario::*;
pub use types::*;
pub use wait_for::*;
