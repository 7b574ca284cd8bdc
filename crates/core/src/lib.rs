#![forbid(unsafe_code)]

mod delete;
mod encode;
mod engine;
mod error;
mod filter;
mod memory;
mod model;
mod paginate;
mod reconstruct;
mod severity;
mod shape;
mod store;

pub use delete::*;
pub use encode::*;
pub use engine::*;
pub use error::*;
pub use filter::*;
pub use memory::MemoryNodeStore;
pub use model::*;
pub use paginate::*;
pub use reconstruct::*;
pub use severity::*;
pub use shape::*;
pub use store::*;

pub mod ids {
    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RootKey(String);

    impl RootKey {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, RootKeyError> {
            let value = value.into();
            validate_root_key(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for RootKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RootKeyError {
        Empty,
        TooLong,
        ContainsControl,
    }

    impl RootKeyError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "root key must not be empty",
                Self::TooLong => "root key is too long",
                Self::ContainsControl => "root key contains control characters",
            }
        }
    }

    fn validate_root_key(value: &str) -> Result<(), RootKeyError> {
        if value.trim().is_empty() {
            return Err(RootKeyError::Empty);
        }
        if value.len() > 256 {
            return Err(RootKeyError::TooLong);
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(RootKeyError::ContainsControl);
        }
        Ok(())
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct NodeId(i64);

    impl NodeId {
        pub const fn new(value: i64) -> Self {
            Self(value)
        }

        pub const fn get(self) -> i64 {
            self.0
        }

        /// Id `offset` slots after `self` inside a reserved block.
        pub const fn offset(self, offset: i64) -> Self {
            Self(self.0 + offset)
        }
    }

    impl std::fmt::Display for NodeId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
}
