// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-support seam: the core moves opaque bytes.
//!
//! Message introspection lives outside this crate. Entities hold a
//! [`TypeSupport`] handle and use it only to size, serialize and
//! deserialize messages; [`TypedSupport`] adapts any [`Message`]
//! implementation into that type-erased surface.

use crate::{Error, Result};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Encode/decode contract for concrete message types.
pub trait Message: Sized + Send + Sync + 'static {
    /// Fully qualified type name (e.g. `pkg/msg/Type`).
    fn type_name() -> &'static str;

    /// Stringified type hash announced through discovery.
    fn type_hash() -> &'static str;

    /// Upper bound on the encoded size of this value.
    fn encoded_len(&self) -> usize;

    /// Encode into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `buf` is too small or encoding fails.
    fn encode(&self, buf: &mut [u8]) -> Result<usize>;

    /// Decode a value from `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `buf` is truncated or contains invalid data.
    fn decode(buf: &[u8]) -> Result<Self>;
}

/// Type-erased handle the entities carry.
pub trait TypeSupport: Send + Sync {
    fn type_name(&self) -> &str;

    fn type_hash(&self) -> &str;

    /// Upper bound on the encoded size of `message`.
    fn encoded_len(&self, message: &dyn Any) -> Result<usize>;

    /// Serialize `message` into `buf`, returning the bytes written.
    fn serialize(&self, message: &dyn Any, buf: &mut [u8]) -> Result<usize>;

    /// Deserialize a message from `bytes`.
    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>>;
}

/// Adapter from a concrete [`Message`] type to the erased surface.
pub struct TypedSupport<T: Message> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Message> TypedSupport<T> {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            _marker: PhantomData,
        })
    }
}

impl<T: Message> TypeSupport for TypedSupport<T> {
    fn type_name(&self) -> &str {
        T::type_name()
    }

    fn type_hash(&self) -> &str {
        T::type_hash()
    }

    fn encoded_len(&self, message: &dyn Any) -> Result<usize> {
        let message = message
            .downcast_ref::<T>()
            .ok_or(Error::SerializationError)?;
        Ok(message.encoded_len())
    }

    fn serialize(&self, message: &dyn Any, buf: &mut [u8]) -> Result<usize> {
        let message = message
            .downcast_ref::<T>()
            .ok_or(Error::SerializationError)?;
        message.encode(buf)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        let message = T::decode(bytes)?;
        Ok(Box::new(message))
    }
}
