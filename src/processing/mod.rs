pub mod dither;
pub mod layout;
pub mod orientation;
pub mod resize;
