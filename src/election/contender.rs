#[cfg(test)]
use mockall::automock;

use crate::Error;
use crate::LeaderSessionId;
use crate::CONTENDER_DESCRIPTION_PREFIX;

/// The party competing for leadership of a resource.
///
/// Callbacks arrive strictly in order (grant and revoke alternate) from the
/// service's event loop and must not block it. They may still race with
/// [`crate::ElectionService::close`], so any leader-only work must be tagged
/// with the session id received in `grant_leadership` and dropped once that
/// session is revoked.
#[cfg_attr(test, automock)]
pub trait Contender: Send + Sync + 'static {
    /// This instance was elected; `session_id` fences everything done under it.
    fn grant_leadership(
        &self,
        session_id: LeaderSessionId,
    );

    /// The previously granted session is no longer valid.
    fn revoke_leadership(&self);

    /// Driver failures and invariant violations.
    fn handle_error(
        &self,
        error: Error,
    );

    /// For logging purposes only.
    fn description(&self) -> String {
        let type_name = std::any::type_name::<Self>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        format!("{}{}", CONTENDER_DESCRIPTION_PREFIX, short)
    }
}
