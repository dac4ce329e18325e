use crate::error::ManagerError;
use engine_config::hooks::{Hook, HookPhase};
use engine_core::connectors::client::{Client, ClientOptions, ClientPool};
use tracing::{info, warn};

/// Runs one phase of hooks on a single dedicated client.
///
/// The client is only checked out when some hook has a statement to run.
/// Empty statements are skipped, the first failure ends the phase, and each
/// hook's wait is honoured after its statements.
pub(crate) async fn exec_hooks(
    pool: &dyn ClientPool,
    options: &ClientOptions,
    graph: &str,
    phase: HookPhase,
    hooks: &[Hook],
) -> Result<(), ManagerError> {
    let has_statements = hooks
        .iter()
        .flat_map(|h| h.statements.iter())
        .any(|s| !s.trim().is_empty());

    let client = if has_statements {
        let client = pool
            .get_client(options)
            .await
            .map_err(|error| ManagerError::ClientPool {
                graph: graph.to_string(),
                error,
            })?;
        Some(client)
    } else {
        None
    };

    let result = run(client.as_deref(), graph, phase, hooks).await;

    if let Some(client) = client {
        if let Err(e) = client.close().await {
            warn!(graph = %graph, phase = %phase, error = %e, "Failed to close hook client");
        }
    }
    result
}

async fn run(
    client: Option<&dyn Client>,
    graph: &str,
    phase: HookPhase,
    hooks: &[Hook],
) -> Result<(), ManagerError> {
    for hook in hooks {
        for statement in hook.statements.iter().filter(|s| !s.trim().is_empty()) {
            let fail = |message: String| ManagerError::Hook {
                graph: graph.to_string(),
                phase,
                statement: statement.clone(),
                message,
            };

            let Some(client) = client else {
                return Err(fail("no client available".into()));
            };
            let resp = client.execute(statement).await.map_err(|e| fail(e.to_string()))?;
            if !resp.is_succeed() {
                return Err(fail(resp.error().unwrap_or("unknown error").to_string()));
            }
            info!(graph = %graph, phase = %phase, statement = %statement, "Hook executed");
        }

        if !hook.wait.is_zero() {
            info!(graph = %graph, phase = %phase, wait_ms = hook.wait.as_millis() as u64, "Hook waiting");
            tokio::time::sleep(hook.wait).await;
        }
    }
    Ok(())
}
