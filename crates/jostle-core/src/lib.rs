//! # Jostle Core
//!
//! Push interaction core for a networked character simulation.
//!
//! When one actor (a *pusher*) overlaps another (a *pushee*), the pushee is
//! displaced by a directional impulse. The center of this crate is the
//! pipeline that decides when and how that happens:
//!
//! ```text
//! ScanTask ──► gather ──► filter/select ──► trigger ──► PushForceTask
//!    ▲                                         │
//!    └──────────── SyncGate / SyncBarrier ◄────┘
//! ```
//!
//! - [`scan::ScanTask`]: a self-rescheduling proximity scan that sweeps a
//!   motion-scaled shape around the pushee at adaptive rates.
//! - [`scan`] filtering: raw hits become [`option::PushOption`]s, filtered
//!   to the currently-activatable set, with change detection so consumers
//!   only hear about meaningful ticks.
//! - [`sync`]: predicted pushes drift client and server apart; the sync
//!   gate periodically inserts a cross-network barrier to re-converge.
//! - [`trigger`]: computes the final direction/strength payload and
//!   dispatches the push through the target's ability system.
//! - [`force`]: the bounded-duration, always-removable motion modifier on
//!   the pushee.
//!
//! The host engine is represented by the [`stagehand`] substrate (clock,
//! timers, world, signals) plus the service traits in [`ability`],
//! [`force`], and [`capability`]. Everything runs single-threaded and
//! cooperatively; see [`host::HostContext`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jostle_core::abilities::{PushScanAbility, ScanAbilityConfig};
//! use jostle_core::host::HostContext;
//! use jostle_core::sync::NetRole;
//!
//! let ctx = HostContext::new(NetRole::Standalone, seed);
//! // ... register actors, capabilities, and ability systems ...
//! let mut scan = PushScanAbility::new(avatar, ScanAbilityConfig::default());
//! scan.activate(&ctx)?;
//! loop {
//!     ctx.advance(frame_dt);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export stagehand for host substrate types
pub use stagehand;

pub mod abilities;
pub mod ability;
pub mod capability;
pub mod curve;
pub mod directory;
pub mod error;
pub mod force;
pub mod host;
pub mod mechanics;
pub mod option;
pub mod params;
pub mod payload;
pub mod scan;
pub mod sync;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use abilities::{PushActionAbility, PushScanAbility, ScanAbilityConfig};
pub use option::{PushOption, PushQuery};
pub use params::{ActionParams, OverrideHandling, ScanParams};
