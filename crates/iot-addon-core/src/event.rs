//! Typed change events delivered by a resource watch.

use std::fmt;

/// A change observed on a watched resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<T> {
    /// The object was created (or replayed on a fresh watch).
    Added(T),
    /// The object was updated.
    Modified(T),
    /// The object was removed.
    Deleted(T),
    /// The backing store reported a stream-level error.
    Error(String),
}

impl<T> ResourceEvent<T> {
    /// Map the carried object, keeping the event type.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResourceEvent<U> {
        match self {
            Self::Added(obj) => ResourceEvent::Added(f(obj)),
            Self::Modified(obj) => ResourceEvent::Modified(f(obj)),
            Self::Deleted(obj) => ResourceEvent::Deleted(f(obj)),
            Self::Error(message) => ResourceEvent::Error(message),
        }
    }

    /// Map the carried object through a fallible conversion.
    ///
    /// # Errors
    ///
    /// Returns the conversion's error.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<ResourceEvent<U>, E> {
        Ok(match self {
            Self::Added(obj) => ResourceEvent::Added(f(obj)?),
            Self::Modified(obj) => ResourceEvent::Modified(f(obj)?),
            Self::Deleted(obj) => ResourceEvent::Deleted(f(obj)?),
            Self::Error(message) => ResourceEvent::Error(message),
        })
    }

    /// The carried object, if this is not an error event.
    #[must_use]
    pub const fn object(&self) -> Option<&T> {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => Some(obj),
            Self::Error(_) => None,
        }
    }

    /// The event type name.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Modified(_) => EventKind::Modified,
            Self::Deleted(_) => EventKind::Deleted,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Event type without the payload, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// See [`ResourceEvent::Added`].
    Added,
    /// See [`ResourceEvent::Modified`].
    Modified,
    /// See [`ResourceEvent::Deleted`].
    Deleted,
    /// See [`ResourceEvent::Error`].
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}
