mod api;
mod callback;
pub mod callback_error;
mod login;
mod verify;

pub use api::api;
pub use callback::callback;
pub use login::login;
pub use verify::verify;
