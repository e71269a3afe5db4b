pub mod binaries;
pub mod processes;
pub mod tools;
pub mod util;

pub use binaries::*;
pub use processes::*;
pub use tools::*;
pub use util::*;
