//! Identity allocator collaborator.

use uuid::Uuid;

/// Produces globally unique opaque session identifiers.
pub trait SessionIdAllocator: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUIDv4-backed allocator, the default everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSessionIdAllocator;

impl SessionIdAllocator for UuidSessionIdAllocator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_non_empty() {
        let alloc = UuidSessionIdAllocator;
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
