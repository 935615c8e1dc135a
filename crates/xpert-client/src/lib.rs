pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod telemetry;

pub use dispatcher::CourseContext;
pub use dispatcher::MessageDispatcher;
pub use error::ApiTransportError;
pub use gateway::ChatGateway;
pub use gateway::ChatReply;
pub use gateway::HttpChatGateway;
pub use telemetry::TelemetrySink;
pub use telemetry::TracingTelemetry;
