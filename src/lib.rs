pub mod logging;
#[path = "overlay/mod.rs"]
pub mod overlay;
