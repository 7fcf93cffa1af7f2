pub mod claim;
pub mod init;
pub mod request;
