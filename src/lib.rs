// Export modules for use in tests
pub mod api;
pub mod export;
pub mod inputs;
pub mod main_app;
pub mod model;
pub mod navigation;
pub mod notes;
pub mod notification;
pub mod panic_handler;
pub mod progress;
pub mod search;
pub mod session;
pub mod transport;
pub mod ui;

// Re-export main app components
pub use main_app::{App, ViewMode, run_app};
