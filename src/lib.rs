pub mod app;
pub mod config;
pub mod draw;
pub mod models;
pub mod overlay;
pub mod services;
pub mod utils;
pub mod widget;

pub use app::App;
pub use config::Config;
pub use draw::DrawingSession;
pub use overlay::reconciler::OverlayReconciler;
pub use overlay::registry::OverlayRegistry;
pub use widget::{HeadlessWidget, MapWidget};
