//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type で型付けする。
//! `EventKey` は offload された envelope の blob key、`InvocationId` は
//! 1 回の worker 起動をログ上で追うための ID。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックスを提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Offloaded envelope のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {}

impl IdMarker for Event {
    fn prefix() -> &'static str {
        "events/"
    }
}

/// Invocation のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvocationMarker {}

impl IdMarker for InvocationMarker {
    fn prefix() -> &'static str {
        "invocation-"
    }
}

/// Blob key of an offloaded envelope; displays as `events/<ulid>`.
pub type EventKey = Id<Event>;

/// Identifier of one worker invocation.
pub type InvocationId = Id<InvocationMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_keys_display_as_blob_keys() {
        let ulid = Ulid::new();
        let key = EventKey::from_ulid(ulid);
        assert_eq!(key.to_string(), format!("events/{ulid}"));
        assert_eq!(key.as_ulid(), ulid);

        let invocation: InvocationId = ulid.into();
        assert!(invocation.to_string().starts_with("invocation-"));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<EventKey>(), size_of::<Ulid>());
        assert_eq!(size_of::<InvocationId>(), size_of::<Ulid>());
    }
}
