//! HTTP adapter for consultation endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, MessageResponse, MessagesQuery,
    SessionSummaryResponse, StageSummary, TemplateSummaryResponse, UserQuery,
};
pub use handlers::ConsultationAppState;
pub use routes::consultation_router;
