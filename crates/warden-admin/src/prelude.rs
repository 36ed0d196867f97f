pub use warden_types::error::{Error, WdResult};
pub use warden_types::types::{Patch, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

pub use crate::AdminApi;

// vim: ts=4
