mod deadline;
mod mounts;
mod output;

pub use deadline::*;
pub use mounts::*;
pub use output::*;
