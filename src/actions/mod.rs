mod resolve;
mod run;

pub use resolve::*;
pub use run::*;
