// Identity module - session lookup that decides guest vs. account storage

pub mod guest_provider;
pub mod local_provider;
pub mod provider;

pub use guest_provider::GuestOnlyProvider;
pub use local_provider::LocalIdentityProvider;
pub use provider::{IdentityProvider, Session};
