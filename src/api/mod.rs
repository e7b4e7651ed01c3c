//! API layer - HTTP endpoint handlers.

mod announcements;
mod health;
mod metrics;
mod queues;
mod response;
mod routes;

pub use announcements::{announcement_stream, AnnouncementQuery};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use queues::{ActionRequest, TicketResponse};
pub use response::{ApiJson, ApiPath, ApiResponse};
pub use routes::api_routes;
