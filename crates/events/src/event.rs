/// An application event that can be produced to a stream.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **named** by a stable type tag the store records alongside the payload
///
/// A producer handling several event kinds usually implements this on an enum,
/// returning one tag per variant.
pub trait Event: core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "cart.item-added").
    fn event_type(&self) -> &'static str;
}
