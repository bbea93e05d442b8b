pub mod discovery;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod webhook;

pub use routes::create_router;
