pub mod auth;
pub mod campaigns;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod payment;
pub mod routes;
pub mod state;
pub mod storage;
pub mod transactions;
pub mod users;
