pub mod push;
pub mod rides;
