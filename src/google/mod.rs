pub mod gmail;
pub mod oauth;
