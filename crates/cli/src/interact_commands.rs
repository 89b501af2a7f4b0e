use std::{path::Path, time::Duration};

use {
    anyhow::{Context, Result},
    flowrelay_config::{FlowrelayConfig, discover_and_load},
    flowrelay_protocol::{InteractRequest, InteractionResult, normalize},
    flowrelay_voiceflow::{ConversationBackend, VoiceflowClient},
    secrecy::ExposeSecret,
};

/// One backend round trip, printed as normalized JSON on stdout.
pub async fn interact(path: Option<&Path>, user: &str, message: &str) -> Result<()> {
    let (config, _) = discover_and_load(path)?;
    let client = backend_client(&config)?;

    let traces = client
        .interact(user, &InteractRequest::text(message))
        .await
        .context("backend request failed")?;
    let result = normalize(&traces);

    println!("{}", render_json(&result)?);
    Ok(())
}

pub fn backend_client(config: &FlowrelayConfig) -> Result<VoiceflowClient> {
    let backend = &config.backend;
    if backend.api_key.expose_secret().trim().is_empty() {
        anyhow::bail!("no backend API key configured (backend.api_key or VOICEFLOW_API_KEY)");
    }
    let client = VoiceflowClient::new(
        backend.api_key.clone(),
        &backend.base_url,
        Duration::from_secs(backend.timeout_secs),
    )?
    .with_project_id(backend.project_id.clone());
    Ok(client)
}

fn render_json(result: &InteractionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
