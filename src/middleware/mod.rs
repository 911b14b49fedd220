mod gateway;
mod request_id;

pub use gateway::gateway_middleware;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
