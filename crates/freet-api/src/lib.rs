pub mod auth;
pub mod error;
pub mod format;
pub mod freets;
pub mod guards;
pub mod middleware;
pub mod routes;
pub mod upvotes;
pub mod users;
