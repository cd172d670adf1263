//! Identifier based admission of bus frames onto the network.
//!
//! A deployment picks one policy shape when the bridge is built:
//!
//! - [`SingleFilter`] forwards one target identifier, or everything when
//!   disabled.
//! - [`ListFilter`] either forwards everything except a blacklist, or nothing
//!   except a whitelist.

use alloc::collections::BTreeSet;
use core::fmt;

/// Admission policy applied to every frame leaving the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionFilter {
    Single(SingleFilter),
    List(ListFilter),
}

impl AdmissionFilter {
    /// Permissive single target filter.
    pub fn single() -> Self {
        AdmissionFilter::Single(SingleFilter::default())
    }

    /// Permissive allow-all list filter.
    pub fn list() -> Self {
        AdmissionFilter::List(ListFilter::default())
    }

    /// Whether a frame with identifier `id` may cross to the network.
    pub fn permits(&self, id: u32) -> bool {
        match self {
            AdmissionFilter::Single(filter) => filter.permits(id),
            AdmissionFilter::List(filter) => filter.permits(id),
        }
    }

    /// Restore the permissive default of the configured variant.
    pub fn reset(&mut self) {
        match self {
            AdmissionFilter::Single(filter) => {
                *filter = SingleFilter::default()
            }
            AdmissionFilter::List(filter) => *filter = ListFilter::default(),
        }
    }

    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionFilter::Single(_) => "single",
            AdmissionFilter::List(_) => "list",
        }
    }

    pub fn as_single(&self) -> Option<&SingleFilter> {
        match self {
            AdmissionFilter::Single(filter) => Some(filter),
            AdmissionFilter::List(_) => None,
        }
    }

    pub fn as_single_mut(&mut self) -> Option<&mut SingleFilter> {
        match self {
            AdmissionFilter::Single(filter) => Some(filter),
            AdmissionFilter::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListFilter> {
        match self {
            AdmissionFilter::List(filter) => Some(filter),
            AdmissionFilter::Single(_) => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListFilter> {
        match self {
            AdmissionFilter::List(filter) => Some(filter),
            AdmissionFilter::Single(_) => None,
        }
    }
}

impl Default for AdmissionFilter {
    fn default() -> Self {
        AdmissionFilter::list()
    }
}

impl From<SingleFilter> for AdmissionFilter {
    fn from(filter: SingleFilter) -> Self {
        AdmissionFilter::Single(filter)
    }
}

impl From<ListFilter> for AdmissionFilter {
    fn from(filter: ListFilter) -> Self {
        AdmissionFilter::List(filter)
    }
}

/// Forwards a single identifier while enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SingleFilter {
    target: Option<u32>,
    enabled: bool,
}

impl SingleFilter {
    pub fn set_target(&mut self, id: u32) {
        self.target = Some(id);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Exact identifier match; an enabled filter without target passes nothing.
    pub fn permits(&self, id: u32) -> bool {
        !self.enabled || self.target == Some(id)
    }
}

/// Whitelist / blacklist filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    allow_all: bool,
    whitelist: BTreeSet<u32>,
    blacklist: BTreeSet<u32>,
}

impl Default for ListFilter {
    fn default() -> Self {
        ListFilter {
            allow_all: true,
            whitelist: BTreeSet::new(),
            blacklist: BTreeSet::new(),
        }
    }
}

impl ListFilter {
    /// Returns `false` if `id` was already listed.
    pub fn add_to_whitelist(&mut self, id: u32) -> bool {
        self.whitelist.insert(id)
    }

    /// Returns `false` if `id` was already listed.
    pub fn add_to_blacklist(&mut self, id: u32) -> bool {
        self.blacklist.insert(id)
    }

    pub fn remove_from_whitelist(&mut self, id: u32) -> bool {
        self.whitelist.remove(&id)
    }

    pub fn remove_from_blacklist(&mut self, id: u32) -> bool {
        self.blacklist.remove(&id)
    }

    pub fn clear_whitelist(&mut self) {
        self.whitelist.clear();
    }

    pub fn clear_blacklist(&mut self) {
        self.blacklist.clear();
    }

    /// `true`: everything except the blacklist, `false`: only the whitelist.
    pub fn set_allow_all(&mut self, allow_all: bool) {
        self.allow_all = allow_all;
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Whitelisted identifiers in ascending order.
    pub fn whitelist(&self) -> impl Iterator<Item = u32> + '_ {
        self.whitelist.iter().copied()
    }

    /// Blacklisted identifiers in ascending order.
    pub fn blacklist(&self) -> impl Iterator<Item = u32> + '_ {
        self.blacklist.iter().copied()
    }

    pub fn display_whitelist(&self) -> IdList<'_> {
        IdList(&self.whitelist)
    }

    pub fn display_blacklist(&self) -> IdList<'_> {
        IdList(&self.blacklist)
    }

    pub fn permits(&self, id: u32) -> bool {
        if self.allow_all {
            !self.blacklist.contains(&id)
        } else {
            self.whitelist.contains(&id)
        }
    }
}

/// Renders identifiers as `0x123, 0x7DF`.
#[derive(Debug, Clone, Copy)]
pub struct IdList<'a>(&'a BTreeSet<u32>);

impl fmt::Display for IdList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, id) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id:#X}")?;
        }
        Ok(())
    }
}
