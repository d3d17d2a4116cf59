mod error;
mod flush;
mod resolve;
mod run;
mod unmount;

pub use error::*;
pub use flush::*;
pub use resolve::*;
pub use run::*;
pub use unmount::*;
