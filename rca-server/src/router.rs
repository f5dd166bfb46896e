use crate::subsystems::{analyze, history};
use rca_core::protocol::{RcaRequest, RcaResponse};
use rca_core::{AnalysisPipeline, ErrorKind, RcaConfig, RcaError};
use serde::Serialize;
use sqlx::SqlitePool;

/// Everything a request needs: the store, config and (if configured) the LLM pipeline.
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: RcaConfig,
    pub pipeline: Option<AnalysisPipeline>,
}

pub async fn handle_request(request: RcaRequest, ctx: &AppContext) -> RcaResponse {
    match request {
        RcaRequest::Health => {
            let sqlite = match rca_core::db::health_check(&ctx.pool).await {
                Ok(v) => v,
                Err(e) => {
                    return RcaResponse::err(
                        ErrorKind::Unavailable,
                        format!("DB Health Check failed: {}", e),
                    )
                }
            };
            let llm = match &ctx.pipeline {
                Some(p) => serde_json::json!({"backend": p.backend_name(), "model": p.model()}),
                None => serde_json::json!("unconfigured"),
            };
            RcaResponse::ok(serde_json::json!({
                "status": "healthy",
                "sqlite": sqlite,
                "llm": llm,
            }))
        }
        RcaRequest::Analyze { log } => {
            reply(analyze::analyze_and_record(&ctx.pool, ctx.pipeline.as_ref(), &log).await)
        }
        RcaRequest::History {
            limit,
            offset,
            newest_first,
        } => {
            let listed =
                history::list_history(&ctx.pool, &ctx.config.history, limit, offset, newest_first)
                    .await;
            match listed {
                Ok(records) => {
                    let count = records.len();
                    match serde_json::to_value(records) {
                        Ok(records) => RcaResponse::ok(serde_json::json!({
                            "records": records,
                            "count": count,
                        })),
                        Err(e) => RcaError::from(e).into(),
                    }
                }
                Err(e) => e.into(),
            }
        }
        RcaRequest::Get { id } => reply(history::get_entry(&ctx.pool, id).await),
        RcaRequest::Feedback {
            id,
            helpful,
            comment,
        } => reply(history::leave_feedback(&ctx.pool, id, helpful, comment).await),
    }
}

fn reply<T: Serialize>(result: Result<T, RcaError>) -> RcaResponse {
    match result.and_then(|v| serde_json::to_value(v).map_err(RcaError::from)) {
        Ok(data) => RcaResponse::ok(data),
        Err(e) => {
            if e.kind() == ErrorKind::Internal {
                tracing::error!(error = %e, "Request failed");
            }
            e.into()
        }
    }
}
