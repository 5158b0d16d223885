//! Pre-persist value validation
//!
//! Validators run before serialization. A rejected value never reaches a
//! backend, and the validator's error is returned to the caller unchanged.

use cairn_core::{CoreResult, StoreError};
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Gate deciding whether a value may be persisted
pub trait Validator: Send + Sync {
    /// Accept the value or fail with `NotImmutable` / `NotSerializable`
    fn validate(&self, value: &dyn Any, type_name: &str) -> CoreResult<()>;
}

impl<F> Validator for F
where
    F: Fn(&dyn Any, &str) -> CoreResult<()> + Send + Sync,
{
    fn validate(&self, value: &dyn Any, type_name: &str) -> CoreResult<()> {
        self(value, type_name)
    }
}

#[derive(Debug, Clone)]
enum Rejection {
    NotImmutable(String),
    NotSerializable(String),
}

/// Rejects values of explicitly listed types
///
/// Useful for types that satisfy the trait bounds but must not be stored, such
/// as handles with interior mutability that serialize a snapshot.
#[derive(Debug, Clone, Default)]
pub struct DenyList {
    rejected: HashMap<TypeId, Rejection>,
}

impl DenyList {
    /// Create an empty deny list
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `T` as not immutable
    pub fn not_immutable<T: 'static>(mut self, reason: impl Into<String>) -> Self {
        self.rejected
            .insert(TypeId::of::<T>(), Rejection::NotImmutable(reason.into()));
        self
    }

    /// Reject `T` as not serializable
    pub fn not_serializable<T: 'static>(mut self, reason: impl Into<String>) -> Self {
        self.rejected
            .insert(TypeId::of::<T>(), Rejection::NotSerializable(reason.into()));
        self
    }

    /// Number of rejected types
    pub fn len(&self) -> usize {
        self.rejected.len()
    }

    /// Check if no type is rejected
    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl Validator for DenyList {
    fn validate(&self, value: &dyn Any, type_name: &str) -> CoreResult<()> {
        match self.rejected.get(&value.type_id()) {
            None => Ok(()),
            Some(Rejection::NotImmutable(reason)) => Err(StoreError::NotImmutable {
                type_name: type_name.to_string(),
                reason: reason.clone(),
            }),
            Some(Rejection::NotSerializable(reason)) => Err(StoreError::NotSerializable {
                type_name: type_name.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}
