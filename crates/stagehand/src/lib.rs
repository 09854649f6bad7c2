//! # Stagehand
//!
//! Deterministic single-threaded host substrate for driving timer-chained
//! gameplay tasks.
//!
//! Stagehand plays the role a game engine normally would: it owns time, the
//! timer scheduler, the actor world that spatial queries run against, and the
//! observer signals actors use to notify tasks. Everything is synchronous and
//! deterministic — advancing the clock by the same deltas produces the same
//! callback order every run, which is what makes the consumers of this crate
//! testable and replayable.
//!
//! ## Modules
//!
//! - [`clock`]: virtual clock measured in seconds
//! - [`timer`]: one-shot timer scheduler, generic over a payload type
//! - [`shape`]: collision shapes and pairwise overlap tests
//! - [`world`]: actor registry with channel-filtered shape sweeps
//! - [`signal`]: single-threaded observer registration
//!
//! ## Example
//!
//! ```
//! use stagehand::clock::VirtualClock;
//! use stagehand::timer::Scheduler;
//!
//! let mut clock = VirtualClock::new();
//! let mut timers: Scheduler<&'static str> = Scheduler::new();
//!
//! timers.schedule_once(0.5, "tick");
//! clock.advance(1.0);
//!
//! let due = timers.advance(clock.now());
//! assert_eq!(due.len(), 1);
//! assert_eq!(due[0].1, "tick");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod shape;
pub mod signal;
pub mod timer;
pub mod world;

pub use clock::VirtualClock;
pub use shape::CollisionShape;
pub use signal::{Signal, Subscription};
pub use timer::{Scheduler, TimerId};
pub use world::{ActorId, ActorState, CollisionChannel, SweepHit, World};
