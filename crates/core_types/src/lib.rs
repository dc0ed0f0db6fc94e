use std::fmt;

/// Identifies one client session; all pages of a session share its id counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Monotonic render counter of one page. Patch batches move a page from one
/// version to the next; the initial markup is `INITIAL`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderVersion(pub u64);

impl RenderVersion {
    pub const INITIAL: RenderVersion = RenderVersion(0);

    pub fn next(self) -> Self {
        RenderVersion(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RenderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
