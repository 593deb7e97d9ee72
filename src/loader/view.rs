use super::Context;

/// Base type every extension view implements.
///
/// Extension bundles link against the host crate and hand out boxed
/// `PrayerView`s from their registered constructors.
pub trait PrayerView: Send {
    /// Fully-qualified class name the view was constructed from
    fn class_name(&self) -> &str;

    /// Restricted context the view was constructed with
    fn context(&self) -> &Context;
}
