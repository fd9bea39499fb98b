//! Page components.

mod home;
mod not_found;
mod session;

pub use home::HomePage;
pub use not_found::NotFoundPage;
pub use session::SessionPage;
