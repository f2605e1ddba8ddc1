//! Kiln Core - Foundational types shared by the Kiln crates
//!
//! - `KilnError` / `Result` - the error taxonomy of a generation run
//! - `Clock` - the time source the poll loop sleeps and measures against

mod clock;
mod error;

pub use clock::{Clock, SystemClock};
pub use error::{KilnError, Result};
