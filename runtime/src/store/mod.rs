pub mod path;
pub mod reactive;
pub mod state;

pub use path::WILDCARD;
pub use reactive::{Listener, Store, Subscription};
pub use state::{default_state, paths};
