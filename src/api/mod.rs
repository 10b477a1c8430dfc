mod rest;

pub use rest::{
    create_router, ApiState, AppError, HealthResponse, VerifyRequest, VerifyResponse,
    CAPACITY_EXHAUSTED_MESSAGE, REPLAY_MESSAGE, VERIFICATION_FAILED_MESSAGE,
};
