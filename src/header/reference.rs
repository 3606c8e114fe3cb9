//! Owned entities: [`Reference`], [`ReadGroup`], [`Program`].
//!
//! Each is owned by exactly one [`Header`](super::Header). Rather than a
//! back-pointer into the owning header (which would need unsafe or
//! `Rc<RefCell<_>>` to satisfy the borrow checker across the owner/owned
//! cycle), each entity stores `(owner: Option<HeaderId>, index: usize)` —
//! an opaque owner handle plus a slot index rather than a raw pointer.
//! `HeaderId` is a process-wide generation counter minted once per
//! `Header::new()`, the same flavour of plain-integer identity used
//! elsewhere in this crate for owned-entity stamping.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a `Header`, used only to check ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderId(u64);

static NEXT_HEADER_ID: AtomicU64 = AtomicU64::new(1);

impl HeaderId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_HEADER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A sequence dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub(crate) owner: Option<HeaderId>,
    pub(crate) index: usize,
    pub name: String,
    pub length: u32,
    pub assembly: Option<String>,
    pub species: Option<String>,
    pub uri: Option<String>,
    pub md5: Option<[u8; 16]>,
}

impl Reference {
    /// Construct a detached (unowned) reference. `length` must lie in
    /// `[1, 2^31 - 1]`; this is checked when the reference is added to a
    /// header, not here, since an unowned reference is just a value.
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            owner: None,
            index: 0,
            name: name.into(),
            length,
            assembly: None,
            species: None,
            uri: None,
            md5: None,
        }
    }

    pub fn with_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    pub fn with_md5(mut self, md5: [u8; 16]) -> Self {
        self.md5 = Some(md5);
        self
    }

    /// The stable integer id assigned when this reference was added to its
    /// owning header. Meaningless (always 0) while unowned.
    pub fn id(&self) -> usize {
        self.index
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// A detached copy, ready to be added to a different header.
    pub fn detached_clone(&self) -> Self {
        Self {
            owner: None,
            index: 0,
            ..self.clone()
        }
    }
}

/// A `@RG` read-group entry, keyed by its unique name within a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroup {
    pub(crate) owner: Option<HeaderId>,
    pub(crate) index: usize,
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl ReadGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            index: 0,
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    pub fn detached_clone(&self) -> Self {
        Self {
            owner: None,
            index: 0,
            ..self.clone()
        }
    }
}

/// A `@PG` program-record entry, keyed by its unique uid within a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub(crate) owner: Option<HeaderId>,
    pub(crate) index: usize,
    pub uid: String,
    pub fields: Vec<(String, String)>,
}

impl Program {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            owner: None,
            index: 0,
            uid: uid.into(),
            fields: Vec::new(),
        }
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    pub fn detached_clone(&self) -> Self {
        Self {
            owner: None,
            index: 0,
            ..self.clone()
        }
    }
}
