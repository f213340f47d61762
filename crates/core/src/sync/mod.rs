//! Display surface synchronization.
//!
//! Surfaces (stream overlay windows, a browser source in a capture tool)
//! attach to the [`ScreenSyncHub`], send `ready`, and then mirror the
//! current image, script and countdown. They can also ask for the next or
//! previous product.

mod config;
mod hub;
mod messages;
mod window;

pub use config::SyncConfig;
pub use hub::{ScreenSyncHub, SurfaceConnection, SurfaceInfo, SurfaceSender, SyncError};
pub use messages::{SurfaceSignal, SurfaceState, SyncMessage};
pub use window::{
    CommandWindowManager, NullWindowManager, SurfaceParams, WindowError, WindowHandle,
    WindowManager,
};
