pub mod constants;
mod timeout;
mod wait_for_element;

pub use timeout::{validate_interaction_timeout, validate_navigation_timeout};
pub use wait_for_element::poll_until;
