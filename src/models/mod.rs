pub mod entry_registry;
pub mod media_entry;
pub mod view_handle;

pub use entry_registry::{EntryRegistry, Unregister};
pub use media_entry::{EntryPatch, MediaEntry, MediaKind, MediaType};
pub use view_handle::{FnHandle, HandleKey, MeasureFuture, ViewHandle, ViewHandleRegistry};
