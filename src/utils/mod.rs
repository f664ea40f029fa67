pub mod format;
pub mod hash;
pub mod html;
pub mod ids;
pub mod jwt;
