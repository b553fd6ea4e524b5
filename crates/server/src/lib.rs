pub mod error;
pub mod http;
pub mod routes;
pub mod state;

pub use state::AppState;

#[cfg(test)]
mod test_support;
