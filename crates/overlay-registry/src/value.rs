//! Implementation values
//!
//! An [`Implementation`] is what gets registered as a base or an extension.
//! Plain data (primitives, sequences, key/value structures) is carried as JSON
//! so it can take part in structural merge. Services (callables, clients,
//! loggers) are opaque shared objects and are only ever replaced.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::any::{type_name, Any};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Shape of an implementation, as seen by the merge rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplementationKind {
    /// `null`, boolean, number or string
    Primitive,
    /// JSON array
    Sequence,
    /// JSON object
    Composite,
    /// Opaque service object or callable
    Service,
}

impl ImplementationKind {
    /// Lowercase label for diagnostics
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Sequence => "sequence",
            Self::Composite => "composite",
            Self::Service => "service",
        }
    }
}

/// A base or extension value held by the registry
///
/// Clones share the underlying allocation, so a value handed out twice from
/// the merged cache is reference-equal (see [`Implementation::ptr_eq`]).
#[derive(Clone)]
pub enum Implementation {
    /// Structured or primitive data
    Data(Arc<JsonValue>),
    /// Opaque service or callable
    Service(Arc<dyn Any + Send + Sync>),
}

impl Implementation {
    /// Wrap a JSON value
    #[inline]
    #[must_use]
    pub fn data(value: JsonValue) -> Self {
        Self::Data(Arc::new(value))
    }

    /// Serialize a typed value into a data implementation
    ///
    /// # Errors
    /// Returns [`ConversionError::Encode`] if the value cannot be represented as JSON
    pub fn from_typed<T: Serialize>(value: &T) -> Result<Self, ConversionError> {
        serde_json::to_value(value)
            .map(Self::data)
            .map_err(ConversionError::Encode)
    }

    /// Wrap a service object
    #[inline]
    #[must_use]
    pub fn service<T: Any + Send + Sync>(value: T) -> Self {
        Self::Service(Arc::new(value))
    }

    /// Wrap an already shared service object
    #[inline]
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Service(value)
    }

    /// Merge-relevant shape of this value
    #[must_use]
    pub fn kind(&self) -> ImplementationKind {
        match self {
            Self::Service(_) => ImplementationKind::Service,
            Self::Data(value) => match value.as_ref() {
                JsonValue::Object(_) => ImplementationKind::Composite,
                JsonValue::Array(_) => ImplementationKind::Sequence,
                _ => ImplementationKind::Primitive,
            },
        }
    }

    /// Whether this is a service (never merged)
    #[inline]
    #[must_use]
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Whether this is a key/value structure eligible for structural merge
    #[inline]
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.kind() == ImplementationKind::Composite
    }

    /// Borrow the JSON value, if this is data
    #[inline]
    #[must_use]
    pub fn as_data(&self) -> Option<&JsonValue> {
        match self {
            Self::Data(value) => Some(value),
            Self::Service(_) => None,
        }
    }

    /// Deserialize data into a typed struct
    ///
    /// # Errors
    /// - [`ConversionError::NotData`] for services
    /// - [`ConversionError::Decode`] when the JSON does not match `T`
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ConversionError> {
        let value = self.as_data().ok_or(ConversionError::NotData)?;
        T::deserialize(value).map_err(ConversionError::Decode)
    }

    /// Recover a typed handle to a service
    ///
    /// # Errors
    /// - [`ConversionError::NotService`] for data
    /// - [`ConversionError::TypeMismatch`] when the service is another type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ConversionError> {
        match self {
            Self::Service(service) => Arc::clone(service).downcast::<T>().map_err(|_| {
                ConversionError::TypeMismatch {
                    expected: type_name::<T>(),
                }
            }),
            Self::Data(_) => Err(ConversionError::NotService {
                expected: type_name::<T>(),
            }),
        }
    }

    /// Reference equality: both sides share one allocation
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => Arc::ptr_eq(a, b),
            (Self::Service(a), Self::Service(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for Implementation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Service(service) => f
                .debug_tuple("Service")
                .field(&format_args!("{:p}", Arc::as_ptr(service)))
                .finish(),
        }
    }
}

/// Data compares by value, services by identity
impl PartialEq for Implementation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Service(a), Self::Service(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<JsonValue> for Implementation {
    fn from(value: JsonValue) -> Self {
        Self::data(value)
    }
}

/// Typed access failures
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Expected data, found a service
    #[error("expected data, found a service")]
    NotData,

    /// Expected a service, found data
    #[error("expected service {expected}, found data")]
    NotService {
        /// Requested Rust type
        expected: &'static str,
    },

    /// Service is a different type
    #[error("service is not a {expected}")]
    TypeMismatch {
        /// Requested Rust type
        expected: &'static str,
    },

    /// JSON did not decode into the requested type
    #[error("data does not decode: {0}")]
    Decode(#[source] serde_json::Error),

    /// Typed value did not encode into JSON
    #[error("value does not encode: {0}")]
    Encode(#[source] serde_json::Error),
}
