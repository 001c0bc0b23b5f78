use std::fmt;

/// Lifecycle points at which plugins are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Before the strategy starts.
    HandlerWillStart,
    /// Before a network request is sent; may replace the request.
    RequestWillFetch,
    /// After a network request failed.
    FetchDidFail,
    /// After a network request succeeded; may replace the response.
    FetchDidSucceed,
    /// Before a cache key is used; may replace the key.
    CacheKeyWillBeUsed,
    /// Before a cache write; may veto it by returning nothing.
    CacheWillUpdate,
    /// Before a cached response is used; may replace or drop it.
    CachedResponseWillBeUsed,
    /// After a cache write.
    CacheDidUpdate,
    /// Before the response is returned; may replace it.
    HandlerWillRespond,
    /// After the response was returned.
    HandlerDidRespond,
    /// After all background work finished.
    HandlerDidComplete,
    /// After the strategy failed; may recover with a response.
    HandlerDidError,
}

impl HookKind {
    /// Every hook kind.
    pub const ALL: [HookKind; 12] = [
        HookKind::HandlerWillStart,
        HookKind::RequestWillFetch,
        HookKind::FetchDidFail,
        HookKind::FetchDidSucceed,
        HookKind::CacheKeyWillBeUsed,
        HookKind::CacheWillUpdate,
        HookKind::CachedResponseWillBeUsed,
        HookKind::CacheDidUpdate,
        HookKind::HandlerWillRespond,
        HookKind::HandlerDidRespond,
        HookKind::HandlerDidComplete,
        HookKind::HandlerDidError,
    ];

    /// Position in [`HookKind::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Hook name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::HandlerWillStart => "handlerWillStart",
            HookKind::RequestWillFetch => "requestWillFetch",
            HookKind::FetchDidFail => "fetchDidFail",
            HookKind::FetchDidSucceed => "fetchDidSucceed",
            HookKind::CacheKeyWillBeUsed => "cacheKeyWillBeUsed",
            HookKind::CacheWillUpdate => "cacheWillUpdate",
            HookKind::CachedResponseWillBeUsed => "cachedResponseWillBeUsed",
            HookKind::CacheDidUpdate => "cacheDidUpdate",
            HookKind::HandlerWillRespond => "handlerWillRespond",
            HookKind::HandlerDidRespond => "handlerDidRespond",
            HookKind::HandlerDidComplete => "handlerDidComplete",
            HookKind::HandlerDidError => "handlerDidError",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of hooks a plugin implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookSet(u16);

impl HookSet {
    /// No hooks.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every hook.
    pub const fn all() -> Self {
        Self((1 << HookKind::ALL.len()) - 1)
    }

    /// Adds `hook` to the set.
    pub const fn with(self, hook: HookKind) -> Self {
        Self(self.0 | (1 << hook.index()))
    }

    /// Whether `hook` is in the set.
    pub const fn contains(&self, hook: HookKind) -> bool {
        self.0 & (1 << hook.index()) != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Hooks in the set, in invocation order.
    pub fn iter(&self) -> impl Iterator<Item = HookKind> + '_ {
        HookKind::ALL.into_iter().filter(|hook| self.contains(*hook))
    }
}

impl FromIterator<HookKind> for HookSet {
    fn from_iter<I: IntoIterator<Item = HookKind>>(iter: I) -> Self {
        iter.into_iter().fold(HookSet::empty(), HookSet::with)
    }
}

impl<const N: usize> From<[HookKind; N]> for HookSet {
    fn from(hooks: [HookKind; N]) -> Self {
        hooks.into_iter().collect()
    }
}
