//! Workflow navigation: pure step guards and the controller applying them

pub mod guards;
pub mod navigation;

pub use navigation::NavigationController;
