use axum::response::Json;

pub const LIVENESS_MESSAGE: &str = "It is working.";

pub async fn liveness() -> Json<[&'static str; 1]> {
    Json([LIVENESS_MESSAGE])
}
