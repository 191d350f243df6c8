use crate::auth::{authorize, AccessRequirement, Capabilities, Role};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{opt_auth, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn auth_authorize(req: &Request) -> Result<Value, HandlerErr> {
    let ctx = opt_auth(&req.params, "auth")?;
    let requirement: AccessRequirement = match req.params.get("requirement") {
        None | Some(Value::Null) => AccessRequirement::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid requirement: {}", e)))?,
    };
    let decision = authorize(ctx.as_ref(), &requirement);
    tracing::debug!(
        user_id = ctx.as_ref().map(|c| c.user_id.as_str()),
        decision = ?decision,
        "guard evaluated"
    );
    Ok(json!({ "decision": decision }))
}

fn auth_capabilities(req: &Request) -> Result<Value, HandlerErr> {
    let role = match opt_auth(&req.params, "auth")? {
        Some(ctx) => ctx.role,
        None => {
            let raw = req
                .params
                .get("role")
                .and_then(|v| v.as_str())
                .ok_or_else(|| HandlerErr::bad_params("missing auth or role"))?;
            Role::parse(raw).ok_or_else(|| {
                HandlerErr::bad_params("unknown role").with_details(json!({ "role": raw }))
            })?
        }
    };
    Ok(json!({ "role": role, "capabilities": Capabilities::for_role(role) }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.authorize" => Some(respond(req, auth_authorize(req))),
        "auth.capabilities" => Some(respond(req, auth_capabilities(req))),
        _ => None,
    }
}
