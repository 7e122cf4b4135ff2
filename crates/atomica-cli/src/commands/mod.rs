pub mod init;
pub mod predict;
pub mod process;
