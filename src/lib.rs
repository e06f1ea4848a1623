mod auth;
mod bearer;
mod config;
mod directory;
mod error;
mod metrics;
mod password;
mod policy;
mod routes;
mod session;
mod shutdown;
mod token;
mod types;
mod users;

pub use auth::*;
pub use bearer::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use metrics::*;
pub use password::*;
pub use policy::*;
pub use routes::*;
pub use session::*;
pub use shutdown::*;
pub use token::*;
pub use types::*;
pub use users::*;
