pub mod camera;
pub mod credentials;
pub mod notify;
pub mod oracle;
