use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::session::Session;

/// An opaque, non-zero token referring to an open [`Session`] of a [`Host`](super::Host).
///
/// The low 32 bits select a slot of the session arena, the high 32 bits carry the
/// generation of the slot. Closing a session bumps the generation, so a stale
/// handle never refers to a session opened later in the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    fn new(index: usize, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | (index as u64 + 1))
    }

    /// The raw value of the handle. Never zero.
    pub fn raw(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 & 0xffff_ffff) as usize - 1
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl TryFrom<u64> for SessionHandle {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if raw & 0xffff_ffff == 0 {
            return Err(Error::InvalidSession(raw));
        }
        Ok(Self(raw))
    }
}

impl From<SessionHandle> for u64 {
    fn from(handle: SessionHandle) -> Self {
        handle.0
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionHandle({:#x})", self.0)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    session: Option<Arc<Mutex<Session>>>,
}

/// The open sessions of a [`Host`](super::Host).
///
/// Each session sits behind its own lock, which serializes all operations on it.
/// The arena lock is only held to look up, insert or remove a session.
#[derive(Debug, Default)]
pub(super) struct SessionArena {
    slots: Mutex<Vec<Slot>>,
}

impl SessionArena {
    pub(super) fn insert(&self, session: Session) -> SessionHandle {
        let mut slots = self.slots.lock();
        let session = Some(Arc::new(Mutex::new(session)));

        let index = match slots.iter().position(|slot| slot.session.is_none()) {
            Some(index) => index,
            None => {
                slots.push(Slot::default());
                slots.len() - 1
            }
        };

        let slot = &mut slots[index];
        slot.session = session;
        SessionHandle::new(index, slot.generation)
    }

    pub(super) fn get(&self, handle: SessionHandle) -> Result<Arc<Mutex<Session>>, Error> {
        self.slots
            .lock()
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.session.clone())
            .ok_or(Error::InvalidSession(handle.raw()))
    }

    pub(super) fn remove(&self, handle: SessionHandle) -> Result<Arc<Mutex<Session>>, Error> {
        let mut slots = self.slots.lock();

        let slot = slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation() && slot.session.is_some())
            .ok_or(Error::InvalidSession(handle.raw()))?;

        slot.generation = slot.generation.wrapping_add(1);
        slot.session
            .take()
            .ok_or(Error::InvalidSession(handle.raw()))
    }

    pub(super) fn len(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.session.is_some())
            .count()
    }
}
