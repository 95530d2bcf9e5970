//! Link-A REST API Module
//! JSON envelope over hotels, rides, event spaces, bookings and reviews

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use routes::create_router;
pub use types::*;
