pub mod files;
pub mod logging;
pub mod template;
pub mod wait;

pub use files::sanitize_file_name;
pub use template::fill_template;
pub use wait::{poll_until, wait_until};
