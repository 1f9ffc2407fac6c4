mod collaborators;
mod error;
mod model;
mod orchestrator;
mod routes;

pub use collaborators::{AllReceiversRouter, InMemorySilenceSource, RouteResolver, SilenceSource};
pub use error::{IngestError, Result};
pub use model::{
    AlertOutcomeStatus, BatchStatus, HealthResponse, HealthState, IncomingAlert, IngestAlertDetail, IngestBatchRequest,
    IngestResponse,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use routes::{app_router, AppState};
