/// Resource name used when none is configured
pub const DEFAULT_RESOURCE_NAME: &str = "default";

/// Prefix of contender descriptions derived from the type name
pub(crate) const CONTENDER_DESCRIPTION_PREFIX: &str = "LeaderContender: ";

/// Own writes remembered per session until the backend echoes them back
pub(crate) const MAX_UNACKNOWLEDGED_WRITES: usize = 16;
