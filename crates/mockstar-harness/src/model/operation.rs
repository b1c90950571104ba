//! Operations for model-based testing.
//!
//! Operations are generated randomly and applied to both the reference model
//! and the real store. Instances are addressed by position in a pool of
//! handles the test holds, the same way application code holds `Managed`
//! handles between calls.

use arbitrary::Arbitrary;
use mockstar_core::StoreError;

/// Position in the handle pool (taken modulo the pool size).
pub type HandleIndex = u8;

/// Position in the issued-reference list (taken modulo its length).
pub type ReferenceIndex = u8;

/// Binding name key; a small space so names collide often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Arbitrary)]
pub struct NameKey(pub u8);

impl NameKey {
    /// Number of distinct names.
    pub const SPACE: u8 = 8;

    /// Binding name for this key.
    pub fn name(self) -> String {
        format!("name{}", self.0 % Self::SPACE)
    }
}

/// Operations that can be applied to the store.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Create a new, not yet admitted instance and add it to the pool.
    Create {
        /// Initial counter value.
        value: u8,
    },

    /// Mutate the instance behind a handle.
    Increment {
        /// Target handle.
        handle: HandleIndex,
    },

    /// Ask for the identity of a handle's instance.
    ObjectId {
        /// Target handle.
        handle: HandleIndex,
    },

    /// Create a reference to a handle's instance.
    CreateReference {
        /// Target handle.
        handle: HandleIndex,
    },

    /// Resolve a previously issued reference, adding the result to the pool.
    ResolveReference {
        /// Target reference.
        reference: ReferenceIndex,
    },

    /// Bind a name to a handle's instance.
    SetBinding {
        /// Name to bind.
        name: NameKey,
        /// Target handle.
        handle: HandleIndex,
    },

    /// Look up a bound name, adding the result to the pool.
    GetBinding {
        /// Name to look up.
        name: NameKey,
    },

    /// Delete a binding.
    RemoveBinding {
        /// Name to unbind.
        name: NameKey,
    },

    /// Flag intent to modify a handle's instance.
    MarkForUpdate {
        /// Target handle.
        handle: HandleIndex,
    },

    /// Remove a handle's instance from the store.
    RemoveObject {
        /// Target handle.
        handle: HandleIndex,
    },

    /// Run the validation pass.
    Validate,
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation succeeded and produced an object identity.
    Id(u64),

    /// Operation failed.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Errors an operation can produce, independent of error payload text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// The handle pool is empty.
    NoHandle,
    /// No reference has been issued yet.
    NoReference,
    /// See [`StoreError::InvalidArgument`]
    InvalidArgument,
    /// See [`StoreError::NotBound`]
    NotBound,
    /// See [`StoreError::NotFound`]
    NotFound,
    /// See [`StoreError::InactiveContext`]
    InactiveContext,
    /// See [`StoreError::Serialization`]
    Serialization,
}

impl From<&StoreError> for OperationError {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(_) => Self::InvalidArgument,
            StoreError::NotBound(_) => Self::NotBound,
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::InactiveContext => Self::InactiveContext,
            StoreError::Serialization { .. } => Self::Serialization,
        }
    }
}

impl From<StoreError> for OperationResult {
    fn from(err: StoreError) -> Self {
        Self::Error(OperationError::from(&err))
    }
}
