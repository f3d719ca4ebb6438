//! 浏览器连接与启动

pub mod connection;
pub mod launch;

pub use connection::{configure_downloads, connect_to_browser_and_page};
pub use launch::launch_browser;
