//! Resource identifiers
//!
//! Local ids look like `eipalloc-1a2b3c4d`. An association is not a separate
//! object: its id is the allocation id re-tagged with the `eipassoc` kind, so
//! the two forms convert into each other without a lookup.

/// Kind tag of allocation ids
pub const ALLOCATION_KIND: &str = "eipalloc";

/// Kind tag of association ids
pub const ASSOCIATION_KIND: &str = "eipassoc";

/// Replace the kind tag of an id, keeping its suffix
///
/// An id without a kind tag is treated as a bare suffix.
pub fn change_kind(id: &str, kind: &str) -> String {
    let suffix = id.rsplit_once('-').map_or(id, |(_, suffix)| suffix);
    format!("{}-{}", kind, suffix)
}

/// Kind tag of an id, if it carries one
pub fn kind_of(id: &str) -> Option<&str> {
    id.rsplit_once('-').map(|(kind, _)| kind)
}

/// Association id emitted for an allocation
pub fn association_id(allocation_id: &str) -> String {
    change_kind(allocation_id, ASSOCIATION_KIND)
}

/// Allocation id an association id refers to
pub fn allocation_id(association_id: &str) -> String {
    change_kind(association_id, ALLOCATION_KIND)
}

/// Generate a fresh allocation id
pub fn new_allocation_id() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", ALLOCATION_KIND, &raw[..8])
}
