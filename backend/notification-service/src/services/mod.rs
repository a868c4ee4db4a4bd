pub mod dispatcher;
pub mod events;
pub mod hub;

pub use dispatcher::*;
pub use events::*;
pub use hub::*;
