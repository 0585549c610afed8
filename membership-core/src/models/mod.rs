pub mod reset_ticket;
pub mod user;

pub use reset_ticket::PasswordResetTicket;
pub use user::{PasswordOptions, User};
