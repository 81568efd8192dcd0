use chrono::{DateTime, Utc};

use hearth_core::TenantId;

/// A committed change to one tenant's books.
///
/// Events are facts: they are published after commit and never edited.
/// Subscribers receive them as JSON payloads keyed by `event_type`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `accounting.voucher.posted`.
    fn event_type(&self) -> &'static str;

    /// Bumped when the payload shape changes incompatibly.
    fn schema_version(&self) -> u32 {
        1
    }

    fn tenant_id(&self) -> TenantId;

    /// Commit time (system clock), not the document date.
    fn occurred_at(&self) -> DateTime<Utc>;
}
