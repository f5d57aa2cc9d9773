/// Classification for fallback policy.
///
/// Used by the source registry to decide what an adapter error means for
/// the rest of the fallback chain.
///
/// | Class | Try Next Source? | Propagated? |
/// |-------|------------------|-------------|
/// | `NextSource` | Yes | Never, counts as an empty result |
/// | `Unexpected` | Yes | Only when raised by the last source |
/// | `Terminal` | No | Always |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Network failures, bad status codes, unparseable bodies and provider
    /// throttling. The source simply had nothing usable for us.
    NextSource,

    /// Something the adapter did not anticipate. Logged and skipped, but if
    /// no source is left to try it becomes the request's error.
    Unexpected,

    /// The request can't succeed anywhere; stop iterating.
    Terminal,
}
