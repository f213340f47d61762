pub mod account;
pub mod error;
pub mod explain;
pub mod files;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod routes;
pub mod sessions;
pub mod surfaces;
pub mod ws;

pub use routes::create_router;
