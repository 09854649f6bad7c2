//! The ability-system boundary.
//!
//! The push core does not own an ability framework; it drives one through
//! the [`AbilitySystem`] trait. Hosts supply one system per actor (registered
//! in the [`ActorDirectory`](crate::directory::ActorDirectory)), and the core
//! only ever asks it to find, grant, gate, or event-trigger abilities.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use stagehand::world::ActorId;

use crate::payload::EventPayload;

/// Identifier for an ability class (the grantable "kind" of an ability).
///
/// # Example
///
/// ```
/// use jostle_core::ability::AbilityClassId;
///
/// const SHOVE: AbilityClassId = AbilityClassId::from_static("shove");
/// assert_eq!(SHOVE.as_str(), "shove");
/// assert_eq!(SHOVE, AbilityClassId::new("shove"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbilityClassId(Cow<'static, str>);

impl AbilityClassId {
    /// Creates an identifier from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(Cow::Owned(id.to_string()))
    }

    /// Creates an identifier from a static string, usable in constants.
    #[must_use]
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AbilityClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AbilityClassId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Handle to a granted ability instance on some [`AbilitySystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbilityHandle(u64);

impl AbilityHandle {
    /// Creates a handle from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value of this handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AbilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ability:{}", self.0)
    }
}

/// A gameplay event tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventTag(Cow<'static, str>);

impl EventTag {
    /// Creates a tag from a string.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(Cow::Owned(tag.to_string()))
    }

    /// Creates a tag from a static string, usable in constants.
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event tag that activates a push ability on its target system.
pub const PUSH_ABILITY_ACTIVATE: EventTag = EventTag::from_static("ability.push.activate");

/// Owner/avatar pair an ability executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    /// The actor that owns the triggering ability system.
    pub owner_actor: ActorId,
    /// The actor the ability acts through.
    pub avatar_actor: ActorId,
}

/// Host-provided ability system for one actor.
///
/// Granting is idempotent per class from the caller's point of view: the core
/// caches granted handles and calls [`grant`](Self::grant) at most once per
/// class per scan task, but implementations should still tolerate repeated
/// grants.
pub trait AbilitySystem {
    /// Grants an ability of `class`, returning its handle.
    fn grant(&mut self, class: &AbilityClassId) -> AbilityHandle;

    /// Returns the handle of an already-granted ability of `class`, if any.
    fn find_handle(&self, class: &AbilityClassId) -> Option<AbilityHandle>;

    /// Returns true if `handle` refers to a granted ability.
    fn has_handle(&self, handle: AbilityHandle) -> bool;

    /// Returns true if the ability behind `handle` could activate right now.
    ///
    /// What this means — cooldowns, tags, resource costs — is entirely up to
    /// the host.
    fn can_activate(&self, handle: AbilityHandle) -> bool;

    /// Attempts to activate the ability behind `handle` from a gameplay
    /// event. Returns whether activation succeeded.
    fn trigger_event(
        &mut self,
        handle: AbilityHandle,
        actor_info: &ActorInfo,
        tag: &EventTag,
        payload: &EventPayload,
    ) -> bool;
}
