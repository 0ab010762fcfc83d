//! MQTT transport around the engine
//!
//! Owns the broker connection, the command-topic subscription, and the engine
//! itself. Because a single task drives both the event loop and the engine,
//! updates are applied strictly serially: no two merges can interleave, and
//! the render side effect is covered by the same discipline.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use thiserror::Error;

use crate::{
    api::message::{DiscoveryPayload, LightStatus},
    engine::{Engine, EngineError},
    models::Config,
};

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("error encoding payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Bridge between the MQTT broker and the light-state engine
pub struct MqttBridge {
    client: AsyncClient,
    event_loop: EventLoop,
    engine: Engine,
    command_topic: String,
    state_topic: String,
    config_topic: String,
    discovery: DiscoveryPayload,
    reconnect_time: Duration,
}

fn default_client_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_owned());

    format!("neolight-{}", host)
}

impl MqttBridge {
    pub fn new(config: &Config, engine: Engine) -> Self {
        let client_id = config
            .mqtt
            .client_id
            .clone()
            .unwrap_or_else(default_client_id);

        let mut options = MqttOptions::new(client_id, &config.mqtt.host, config.mqtt.port);
        options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive));

        if let (Some(username), Some(password)) =
            (config.mqtt.username.as_ref(), config.mqtt.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 4);

        Self {
            client,
            event_loop,
            engine,
            command_topic: config.mqtt.command_topic.clone(),
            state_topic: config.mqtt.state_topic.clone(),
            config_topic: config.mqtt.config_topic.clone(),
            discovery: DiscoveryPayload::new(config),
            reconnect_time: Duration::from_millis(config.mqtt.reconnect_time as _),
        }
    }

    /// Run the bridge until a fatal error occurs.
    ///
    /// Connection errors are not fatal: the event loop reconnects after a
    /// backoff delay. A failed render is: retrying a partial hardware write
    /// without knowing its effect is unsafe, so the error is handed to the
    /// supervisor instead.
    pub async fn run(mut self) -> Result<(), MqttError> {
        loop {
            tokio::select! {
                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        self.on_connect().await?;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.on_publish(publish).await?;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        error!(%error, "lost connection to MQTT broker");
                        tokio::time::sleep(self.reconnect_time).await;
                    }
                },

                // Periodic device rewrites while the broker is quiet
                result = self.engine.update() => {
                    result?;
                }
            }
        }
    }

    async fn on_connect(&mut self) -> Result<(), MqttError> {
        info!(topic = %self.command_topic, "connected to MQTT broker");

        self.client
            .subscribe(&self.command_topic, QoS::AtLeastOnce)
            .await?;

        // Retained discovery payload so Home Assistant (re-)learns the light
        self.client
            .publish(
                &self.config_topic,
                QoS::AtLeastOnce,
                true,
                serde_json::to_vec(&self.discovery)?,
            )
            .await?;

        // Announce the current canonical state
        let status = self.engine.state().into();
        self.publish_status(status).await
    }

    async fn on_publish(&mut self, publish: Publish) -> Result<(), MqttError> {
        let status = handle_publish(
            &mut self.engine,
            &self.command_topic,
            &publish.topic,
            &publish.payload,
        )
        .await?;

        if let Some(status) = status {
            self.publish_status(status).await?;
        }

        Ok(())
    }

    async fn publish_status(&mut self, status: LightStatus) -> Result<(), MqttError> {
        self.client
            .publish(
                &self.state_topic,
                QoS::AtLeastOnce,
                false,
                serde_json::to_vec(&status)?,
            )
            .await?;

        Ok(())
    }
}

/// Handle one raw publish against the engine.
///
/// Publishes on other topics are ignored. Malformed or out-of-range command
/// payloads are rejected whole: nothing is merged, nothing is rendered, and
/// `None` is returned so nothing is echoed. A decoded command is applied and
/// the canonical state to echo is returned.
async fn handle_publish(
    engine: &mut Engine,
    command_topic: &str,
    topic: &str,
    payload: &[u8],
) -> Result<Option<LightStatus>, EngineError> {
    if topic != command_topic {
        return Ok(None);
    }

    let command = match serde_json::from_slice(payload) {
        Ok(command) => command,
        Err(error) => {
            warn!(%error, "ignoring invalid command payload");
            return Ok(None);
        }
    };

    let state = engine.apply_update(&command).await?;
    Ok(Some(state.into()))
}
