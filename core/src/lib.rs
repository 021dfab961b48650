mod camera;
pub mod config;
pub mod error;
pub mod event;
pub mod input;
pub mod navigation;
pub mod pick;
pub mod props;
pub mod selection;
mod viewer;

// `pub use ... as scene` makes crate::scene::* resolve to unionview_scene::*
pub use unionview_scene as scene;
pub use unionview_scene::common;

pub use camera::{Camera, Viewport};
pub use config::ViewerConfig;
pub use error::ViewerError;
pub use event::{CallbackId, EventDispatcher, EventKind, ViewerEvent};
pub use input::{ModifierKey, Modifiers, MouseButton, PointerEvent, PointerEventKind};
pub use navigation::{NavigationFrame, NavigationStack, Scope};
pub use pick::{PickHit, PickResolver};
pub use props::{PropertyUpdateService, PropsUpdateReport};
pub use selection::{ClickAction, SelectionConfig, SelectionSet};
pub use viewer::Viewer;
