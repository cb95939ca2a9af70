//! Request lifecycle
//!
//! # Phases
//!
//! ```text
//! 1. Request normalization         (malformed body → error, nothing started)
//!    ↓
//! 2. Configuration + Events + Router
//!    ↓
//! 3. Modules instantiated, persisted activation restored
//!    ↓
//! 4. on_start (each module)        ← resolvers and listeners registered
//!    ↓
//! 5. init                          ← event
//!    ↓
//! 6. Resolution
//!    ↓
//! 7. pre_request_end {status}      ← event
//!    ↓
//! 8. request_end                   ← event
//!    ↓
//! 9. on_finish (each module)
//! ```

mod application;
mod context;
mod shutdown;

pub use application::{AppState, Application, Bootstrap};
pub use context::AppContext;
pub use shutdown::shutdown_signal;
