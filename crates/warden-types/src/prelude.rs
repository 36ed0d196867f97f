pub use crate::error::{Error, WdResult};
pub use crate::types::{Patch, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
