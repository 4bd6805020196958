//! The dispatch state machine.
//!
//! States run strictly in order, and any of them may short-circuit:
//! StaticCheck → BodyIngest → SessionAcquire → BeforeRouterFilters →
//! RouteMatch → BeforeExecFilters → TargetInvoke → AfterExecFilters.
//! The serve tail (FinishRouter filters, the dev access line, statistics)
//! runs on every path out, short-circuits included.
//!
//! Recovery has exactly one boundary, in [`Registry::serve`]: interrupts
//! raised anywhere inside the chain surface there, and with panic recovery
//! enabled real panics are caught at the same place and converted to
//! failures.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use tracing::{debug, error, warn};

use talaria_core::{Context, ErrorEnvelope, Interrupt, Request, Response};
use talaria_filter::Phase;

use crate::param::bind_args;
use crate::registry::{Registry, RegistryCore, RouteTarget, KNOWN_METHODS};

impl Registry {
    /// Serves one request to completion and returns the buffered response.
    pub fn serve(&self, request: Request) -> Response {
        let started_at = Instant::now();
        let mut ctx = self.pool.checkout(request);
        let path = ctx.request.path().to_string();
        let method = ctx.request.method.clone();

        let result = if self.core.config.recover_panic {
            match catch_unwind(AssertUnwindSafe(|| self.chain_root.filter(&mut ctx, &path))) {
                Ok(outcome) => outcome.map(|_| ()),
                Err(payload) => Err(Interrupt::Failure(panic_message(payload.as_ref()))),
            }
        } else {
            self.chain_root.filter(&mut ctx, &path).map(|_| ())
        };
        if let Err(interrupt) = result {
            recover(&self.core, &mut ctx, &interrupt);
        }

        if let Some(provider) = &self.core.session_provider {
            if let Some(session) = ctx.session.take() {
                if let Err(err) = provider.release(session) {
                    warn!(error = %err, request_id = %ctx.request_id(), "session release failed");
                }
            }
        }

        // the tail always runs, whatever path the request took out
        if let Err(interrupt) = self.core.filters.run(Phase::FinishRouter, &mut ctx, &path) {
            recover(&self.core, &mut ctx, &interrupt);
        }

        if ctx.output.status().is_none() {
            ctx.output.set_status(StatusCode::OK);
        }
        let status = ctx.output.status().unwrap_or(StatusCode::OK);
        let elapsed = started_at.elapsed();
        let key = ctx
            .input
            .matched_pattern()
            .unwrap_or(path.as_str())
            .to_string();
        self.core.stats.record(method.as_str(), &key, elapsed);
        if self.core.config.dev_mode {
            debug!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                request_id = %ctx.request_id(),
                "request served"
            );
        }

        let response = Response {
            status,
            headers: ctx.output.headers().clone(),
            body: ctx.output.take_body(),
        };
        self.pool.restore(ctx);
        response
    }
}

/// Runs the state machine for one request. Installed as the innermost
/// filter-chain link at build time.
pub(crate) fn dispatch(core: &RegistryCore, ctx: &mut Context) -> Result<(), Interrupt> {
    let path = ctx.request.path().to_string();

    // StaticCheck
    if core.filters.run(Phase::BeforeStatic, ctx, &path)? {
        return Ok(());
    }
    if let Some(static_handler) = &core.static_handler {
        if core
            .config
            .static_dirs
            .iter()
            .any(|dir| path.starts_with(dir.as_str()))
        {
            static_handler(ctx)?;
            if ctx.output.started() {
                return Ok(());
            }
        }
    }

    if !KNOWN_METHODS.contains(&ctx.request.method) {
        return Err(Interrupt::method_not_allowed());
    }

    // BodyIngest
    let mut method = ctx.request.method.clone();
    let query = ctx.request.query().map(str::to_string);
    if method == Method::GET || method == Method::HEAD || !core.config.copy_request_body {
        ctx.input.parse_form(query.as_deref(), None);
    } else {
        if ctx.request.body.len() > core.config.max_body_size {
            return Err(Interrupt::payload_too_large());
        }
        let body = is_urlencoded(ctx)
            .then(|| String::from_utf8_lossy(&ctx.request.body).into_owned());
        ctx.input.parse_form(query.as_deref(), body.as_deref());
    }

    // POST may tunnel PUT/DELETE through a `_method` form value
    if method == Method::POST {
        if let Some(tunneled) = ctx.input.query("_method") {
            match tunneled.to_ascii_uppercase().as_str() {
                "PUT" => method = Method::PUT,
                "DELETE" => method = Method::DELETE,
                _ => {}
            }
        }
    }

    // SessionAcquire
    if core.config.session_on {
        if let Some(provider) = &core.session_provider {
            match provider.acquire(&ctx.request) {
                Ok(session) => ctx.session = Some(session),
                Err(err) => {
                    error!(error = %err, request_id = %ctx.request_id(), "session acquire failed");
                    return Err(Interrupt::Abort { status: 503 });
                }
            }
        }
    }

    // BeforeRouterFilters
    if core.filters.run(Phase::BeforeRouter, ctx, &path)? {
        return Ok(());
    }

    // RouteMatch: a filter-installed handler wins over the trees
    if let Some(handler) = ctx.take_handler_override() {
        if core.filters.run(Phase::BeforeExec, ctx, &path)? {
            return Ok(());
        }
        handler(ctx)?;
        core.filters.run(Phase::AfterExec, ctx, &path)?;
        return Ok(());
    }

    let Some(tree) = core.table.tree(&method) else {
        return Err(Interrupt::method_not_allowed());
    };
    let Some((leaf, params)) = tree.match_leaf(&path) else {
        return Err(Interrupt::not_found());
    };
    let pattern = leaf.pattern().to_string();
    let target = Arc::clone(leaf.payload());
    for (name, value) in &params {
        ctx.input.set_param(name, value);
        if name == "splat" && !value.is_empty() {
            // the joined remainder also expands to numeric params
            for (i, part) in value.split('/').enumerate() {
                ctx.input.set_param(i.to_string(), part);
            }
        }
    }
    ctx.input.set_matched_pattern(pattern);

    // BeforeExecFilters
    if core.filters.run(Phase::BeforeExec, ctx, &path)? {
        return Ok(());
    }

    // TargetInvoke
    invoke_target(core, ctx, &target, &method)?;

    // AfterExecFilters
    core.filters.run(Phase::AfterExec, ctx, &path)?;
    Ok(())
}

fn invoke_target(
    core: &RegistryCore,
    ctx: &mut Context,
    target: &RouteTarget,
    method: &Method,
) -> Result<(), Interrupt> {
    match target {
        RouteTarget::Handler { func, methods } => {
            if let Some(allowed) = methods {
                if !allowed.contains(method) {
                    return Err(Interrupt::method_not_allowed());
                }
            }
            func(ctx)
        }
        RouteTarget::Raw { handler } => handler.handle(ctx),
        RouteTarget::Controller {
            descriptor,
            methods,
        } => {
            let action = methods
                .get(method.as_str())
                .or_else(|| methods.get("*"))
                .cloned()
                .unwrap_or_else(|| default_action(method));

            let mut controller = descriptor.instantiate();
            controller.init(ctx)?;
            controller.prepare(ctx)?;
            if core.config.enable_xsrf && is_mutating(method) {
                check_xsrf(ctx)?;
            }
            controller.url_mapping(ctx)?;
            if let Some(specs) = descriptor.arg_specs(&action) {
                bind_args(specs, ctx)?;
            }
            let mut result = controller.handle(&action, ctx);
            if result.is_ok() && core.config.auto_render && !ctx.output.started() {
                result = controller.render(ctx);
            }
            // finish runs whatever the action did
            let finish = controller.finish(ctx);
            result?;
            finish
        }
    }
}

/// Maps a verb to its conventional action name: GET → `Get`.
fn default_action(method: &Method) -> String {
    let name = method.as_str();
    let mut action = String::with_capacity(name.len());
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        action.push(first.to_ascii_uppercase());
    }
    for c in chars {
        action.push(c.to_ascii_lowercase());
    }
    action
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::DELETE
        || *method == Method::PATCH
}

/// Mutating requests must carry an XSRF token in the `_xsrf` form value or
/// the `X-Xsrftoken` / `X-Csrftoken` headers. Token validation itself is the
/// session layer's concern; dispatch only enforces presence.
fn check_xsrf(ctx: &Context) -> Result<(), Interrupt> {
    let present = ctx.input.query("_xsrf").is_some()
        || ctx.request.header("x-xsrftoken").is_some()
        || ctx.request.header("x-csrftoken").is_some();
    if present {
        Ok(())
    } else {
        Err(Interrupt::Abort { status: 422 })
    }
}

fn is_urlencoded(ctx: &Context) -> bool {
    ctx.request
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// The single recovery boundary. Aborts are deliberate and never logged as
/// errors; failures go through the error-handler table or become a 500.
fn recover(core: &RegistryCore, ctx: &mut Context, interrupt: &Interrupt) {
    match interrupt {
        Interrupt::Abort { status } => {
            if let Some(handler) = core.error_handlers.get(&status.to_string()) {
                if handler(ctx).is_err() {
                    ctx.output.set_status_u16(500);
                    return;
                }
                if ctx.output.status().is_none() {
                    ctx.output.set_status_u16(*status);
                }
            } else {
                ctx.output.set_status_u16(*status);
            }
        }
        Interrupt::Failure(msg) => {
            if let Some(handler) = core.error_handlers.get(msg.as_str()) {
                if handler(ctx).is_err() {
                    ctx.output.set_status_u16(500);
                    return;
                }
                if ctx.output.status().is_none() {
                    ctx.output.set_status_u16(500);
                }
            } else {
                error!(
                    error = %msg,
                    request_id = %ctx.request_id(),
                    backtrace = %Backtrace::capture(),
                    "handler failure"
                );
                ctx.output.set_status_u16(500);
                if core.config.expose_errors {
                    let request_id = ctx.request_id().to_string();
                    let envelope = ErrorEnvelope {
                        status: 500,
                        error: msg,
                        request_id: &request_id,
                    };
                    if ctx.output.json(&envelope).is_err() {
                        ctx.output.write_str("internal server error");
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
