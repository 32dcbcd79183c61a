pub mod achievement;
pub mod amount;
pub mod error;
pub mod event;
pub mod profile;
pub mod tier;
pub mod view;

pub use achievement::*;
pub use error::*;
pub use event::*;
pub use profile::*;
pub use tier::*;
pub use view::*;
