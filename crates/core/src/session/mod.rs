pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{SessionSettings, SessionSnapshot, SessionStore};
