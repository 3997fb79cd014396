pub mod audio;
pub mod events;

pub use events::{ClientEvent, ServerEvent};
pub use events::server::error::ErrorDetails;
