//! Exam practice backend: subject question bank, timed exam sessions, AI personalised
//! practice and result summaries, served over HTTP and WebSocket.

pub mod bank;
pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod openai;
pub mod practice;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod session;
pub mod state;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod timer;
pub mod util;

pub use routes::build_router;
pub use state::AppState;
