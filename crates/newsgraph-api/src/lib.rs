pub mod error;
pub mod handlers;
pub mod health;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::Server;
pub use state::{AppState, API_VERSION};
