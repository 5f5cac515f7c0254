pub mod backing;
pub mod file;

pub use backing::ReadAt;
pub use file::FileBacking;
