pub mod platform;
pub mod push;
pub mod store;
pub mod surface;
pub mod time;

pub use platform::PushPlatform;
pub use push::PushSender;
pub use store::DataStore;
pub use surface::NotificationSurface;
pub use time::TimeProvider;
