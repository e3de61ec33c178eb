mod bail;
mod shutdown;

pub mod prelude {
    pub use crate::bail::ClientBailError;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
