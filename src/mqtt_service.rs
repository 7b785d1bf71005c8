use crate::config::{Config, Topic};
use crate::db::DatabaseSink;
use crate::service_utils::utc_timestamp;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, Publish, QoS, SubscribeFilter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Event loop capacity for the rumqttc client.
const EVENT_LOOP_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("MQTT connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("MQTT subscribe request failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Connecting,
    Connected,
}

/// A received message as it appears in the log: UTC timestamp, topic, and
/// the payload decoded as UTF-8 text.
#[derive(Debug)]
pub struct MessageRecord {
    pub timestamp: String,
    pub topic: String,
    pub payload: String,
}

pub struct MqttService {
    config: Arc<Config>,
    db: Option<DatabaseSink>,
}

impl MqttService {
    /// Builds the service from a loaded configuration. When a `db` block is
    /// configured this also sets up the placeholder database sink, which
    /// logs its one-time "connected" line.
    pub fn new(config: Arc<Config>) -> Self {
        let db = config.db.as_ref().map(DatabaseSink::connect);
        Self { config, db }
    }

    /// Connects to the broker and drives the event loop indefinitely.
    ///
    /// Subscriptions are issued as one batch once the broker acknowledges
    /// the connection; every inbound publish is logged. There is no
    /// reconnect policy: the first event-loop error is fatal and propagates
    /// to the caller.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let server = &self.config.server_connection;

        let client_id = format!("mqtt_service_{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, &server.host, server.port);
        options.set_keep_alive(Duration::from_secs(server.keep_alive));
        if let Some((username, password)) = server.credentials() {
            options.set_credentials(username, password);
        }

        info!("Connecting to MQTT broker at {}:{}...", server.host, server.port);
        let (client, mut eventloop) = AsyncClient::new(options, EVENT_LOOP_CAPACITY);
        let mut state = ClientState::Connecting;

        loop {
            match eventloop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    info!("Connected with result code {:?}", ack.code);
                    state = ClientState::Connected;

                    let filters = subscription_filters(&self.config.topics);
                    if !filters.is_empty() {
                        client.subscribe_many(filters).await?;
                        info!("Subscribed to {} topic(s).", self.config.topics.len());
                    }
                }
                Event::Incoming(Packet::Publish(publish)) => {
                    debug_assert_eq!(state, ClientState::Connected);
                    self.handle_publish(&publish);
                }
                Event::Incoming(packet) => {
                    debug!("Incoming event: {:?}", packet);
                }
                Event::Outgoing(outgoing) => {
                    debug!("Outgoing event: {:?}", outgoing);
                }
            }
        }
    }

    fn handle_publish(&self, publish: &Publish) {
        let record = message_record(&publish.topic, &publish.payload);
        info!(
            "[{}] Message received on {}: {}",
            record.timestamp, record.topic, record.payload
        );

        if let Some(db) = &self.db {
            db.insert_placeholder(&record.timestamp, &record.payload);
        }
    }

    #[cfg(test)]
    fn has_database_sink(&self) -> bool {
        self.db.is_some()
    }
}

/// Builds the batch subscription request: one filter per configured topic,
/// in configuration order.
pub(crate) fn subscription_filters(topics: &[Topic]) -> Vec<SubscribeFilter> {
    topics
        .iter()
        .map(|topic| SubscribeFilter::new(topic.name.clone(), qos_level(topic.qos)))
        .collect()
}

/// Configuration validation guarantees qos is in 0..=2.
pub(crate) fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn message_record(topic: &str, payload: &[u8]) -> MessageRecord {
    MessageRecord {
        timestamp: utc_timestamp(),
        topic: topic.to_string(),
        payload: String::from_utf8_lossy(payload).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn filters_preserve_order_and_qos() {
        let topics = vec![
            Topic { name: "a".into(), qos: 0 },
            Topic { name: "b".into(), qos: 2 },
        ];

        let filters = subscription_filters(&topics);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].path, "a");
        assert_eq!(filters[0].qos, QoS::AtMostOnce);
        assert_eq!(filters[1].path, "b");
        assert_eq!(filters[1].qos, QoS::ExactlyOnce);
    }

    #[test]
    fn empty_topic_list_yields_no_filters() {
        assert!(subscription_filters(&[]).is_empty());
    }

    #[test]
    fn record_carries_topic_and_decoded_payload() {
        let record = message_record("t", b"hello");
        assert_eq!(record.topic, "t");
        assert_eq!(record.payload, "hello");
        assert_eq!(record.timestamp.len(), 19);
    }

    #[test]
    fn invalid_utf8_payload_is_decoded_lossily() {
        let record = message_record("t", &[0x68, 0x69, 0xff]);
        assert_eq!(record.payload, "hi\u{fffd}");
    }

    #[test]
    fn sink_exists_only_when_db_is_configured() {
        let without_db = Config::from_json(
            r#"{
                "server_connection": {"host": "h", "port": 1883, "keep_alive": 60},
                "topics": [{"name": "t", "qos": 1}]
            }"#,
        )
        .unwrap();
        assert!(!MqttService::new(Arc::new(without_db)).has_database_sink());

        let with_db = Config::from_json(
            r#"{
                "server_connection": {"host": "h", "port": 1883, "keep_alive": 60},
                "topics": [],
                "db": {
                    "host": "db", "port": "5432", "db_name": "d",
                    "username": "u", "password": "p"
                }
            }"#,
        )
        .unwrap();
        assert!(MqttService::new(Arc::new(with_db)).has_database_sink());
    }

    #[test]
    fn sample_config_subscribes_to_one_topic() {
        let config = Config::from_json(
            r#"{
                "server_connection": {"host": "h", "port": 1883, "keep_alive": 60},
                "topics": [{"name": "t", "qos": 1}]
            }"#,
        )
        .unwrap();

        let filters = subscription_filters(&config.topics);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].path, "t");
        assert_eq!(filters[0].qos, QoS::AtLeastOnce);
    }
}
