pub use user::*;

mod user;
