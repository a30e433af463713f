//! API endpoint modules organized by resource.

pub mod bookings;
pub mod chats;
pub mod users;
