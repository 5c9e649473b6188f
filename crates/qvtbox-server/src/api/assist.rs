//! Storefront assistant endpoint: rule-based intent, canned reply.

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use qvtbox_core::intent::{classify, reply_for, Intent};

use super::{ApiResponse, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct AssistRequest {
    message: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AssistReply {
    intent: Intent,
    reply: &'static str,
}

pub(super) async fn assist(
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AssistRequest>,
) -> Json<ApiResponse<AssistReply>> {
    let intent = classify(&body.message);
    tracing::debug!(?intent, "assist message classified");

    Json(ApiResponse {
        data: AssistReply {
            intent,
            reply: reply_for(intent),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}
