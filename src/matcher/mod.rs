mod address;
mod field;
mod port;

pub use address::{address_matches, AddressMatcher};
pub use field::FieldMatcher;
pub use port::{port_matches, PortMatcher};

/// Trait for rule field matchers
pub trait Matcher<C: ?Sized>: Send + Sync {
    /// Check if the candidate value is covered by this rule field
    fn matches(&self, candidate: &C) -> bool;
}
