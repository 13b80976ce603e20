//! Real-time mixing engine for mixbus.
//!
//! Two threads share a session:
//!
//! - the **control thread** owns an [`Engine`]. It validates each
//!   [`Command`] against the model, publishes a [`SessionSnapshot`] and
//!   broadcasts [`Notification`]s;
//! - the **audio thread** runs the renderer inside an
//!   [`AudioBackend`](mixbus_io::AudioBackend) callback. It never locks or
//!   allocates in steady state, and frees nothing itself: replaced objects
//!   travel back to the control thread.
//!
//! Any thread can read meters, the playhead and the latest snapshot through a
//! cloneable [`SessionHandle`].
//!
//! ```rust
//! use mixbus_config::Project;
//! use mixbus_engine::{Command, Engine, EngineConfig};
//! use mixbus_io::NullBackend;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.load_project(&Project::starter("demo"), std::path::Path::new(".")).unwrap();
//! engine.apply(Command::Play).unwrap();
//!
//! engine.start(Box::new(NullBackend::new()), Default::default()).unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(20));
//! engine.poll().unwrap();
//! engine.stop().unwrap();
//!
//! assert!(engine.handle().position() > 0);
//! ```

mod command;
mod engine;
mod error;
mod renderer;
mod shared;
mod snapshot;

pub use command::{Applied, Command, Notification};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use shared::AtomicLevel;
pub use snapshot::{SessionHandle, SessionSnapshot, TrackSummary, TransportSummary};
