pub mod merch;
pub mod stream;
pub mod video;
