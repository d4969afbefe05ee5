//! Transport envelope
//!
//! Device payloads are submitted inside an `m:Push` message carrying tracking
//! identifiers, the recipient node and service, and the sending party.

use crate::documents::Element;
use crate::namespaces::{eudamed, NamespaceContext, QName, XSI_NAMESPACE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message envelope settings of a device group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    /// Service access token issued to the sender
    pub security_token: String,
    /// Actor code of the sending party
    pub actor_code: String,
    /// Party identifier of the sending node
    pub party_id: String,
    /// Recipient node actor code
    pub node_actor_code: String,
    /// Recipient node identifier
    pub node_id: String,
    /// Recipient service
    pub service_id: String,
    /// Recipient service operation
    pub service_operation: String,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            security_token: String::new(),
            actor_code: String::new(),
            party_id: String::new(),
            node_actor_code: "EUDAMED".to_string(),
            node_id: "eDelivery:EUDAMED".to_string(),
            service_id: "DEVICE".to_string(),
            service_operation: "POST".to_string(),
        }
    }
}

/// Identifiers and timestamp that make a message unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingIds {
    /// Conversation identifier
    pub conversation_id: String,
    /// Correlation identifier
    pub correlation_id: String,
    /// Message identifier
    pub message_id: String,
    /// UTC creation timestamp
    pub creation_date_time: String,
}

impl TrackingIds {
    /// Fresh random identifiers stamped with the current time
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Fresh random identifiers stamped with `now`
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
            creation_date_time: format_timestamp(now),
        }
    }
}

/// ISO-8601 UTC timestamp with microseconds and a `Z` suffix
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Builder for `m:Push` messages
#[derive(Debug, Clone)]
pub struct Envelope {
    settings: EnvelopeSettings,
    ids: TrackingIds,
}

impl Envelope {
    /// Create an envelope with freshly generated tracking identifiers
    pub fn new(settings: EnvelopeSettings) -> Self {
        Self {
            settings,
            ids: TrackingIds::generate(),
        }
    }

    /// Use fixed tracking identifiers
    pub fn with_tracking_ids(mut self, ids: TrackingIds) -> Self {
        self.ids = ids;
        self
    }

    /// Tracking identifiers written into the message
    pub fn tracking_ids(&self) -> &TrackingIds {
        &self.ids
    }

    /// Wrap payload roots in a `m:Push` message.
    ///
    /// Namespace declarations of the payload roots move to the message root so
    /// every prefix is declared once.
    pub fn wrap(&self, payload: Vec<Element>) -> Element {
        let mut declarations = NamespaceContext::new();
        declarations.add_prefix("m", eudamed::MESSAGE);
        declarations.add_prefix("s", eudamed::SERVICE);
        declarations.add_prefix("xsi", XSI_NAMESPACE);

        let mut payload_element = message("payload");
        for mut root in payload {
            let mut kept = NamespaceContext::new();
            if let Some(default) = root.namespaces.get_default_namespace() {
                kept.set_default_namespace(default);
            }
            for (prefix, uri) in root.namespaces.iter() {
                let existing = declarations.get_namespace(prefix).map(str::to_string);
                match existing {
                    None => declarations.add_prefix(prefix, uri),
                    Some(existing) if existing == uri => {}
                    // Same prefix bound elsewhere: keep the local declaration
                    Some(_) => kept.add_prefix(prefix, uri),
                }
            }
            root.namespaces = kept;
            payload_element.add_child(root);
        }

        let settings = &self.settings;
        let recipient = message("recipient")
            .with_child(
                message("node")
                    .with_child(service("nodeActorCode").with_text(&settings.node_actor_code))
                    .with_child(service("nodeID").with_text(&settings.node_id)),
            )
            .with_child(
                message("service")
                    .with_child(service("serviceAccessToken").with_text(&settings.security_token))
                    .with_child(service("serviceID").with_text(&settings.service_id))
                    .with_child(service("serviceOperation").with_text(&settings.service_operation)),
            );
        let sender = message("sender").with_child(
            message("node")
                .with_child(service("nodeActorCode").with_text(&settings.actor_code))
                .with_child(service("nodeID").with_text(&settings.party_id)),
        );

        let mut push = message("Push")
            .with_child(message("conversationID").with_text(&self.ids.conversation_id))
            .with_child(message("correlationID").with_text(&self.ids.correlation_id))
            .with_child(message("creationDateTime").with_text(&self.ids.creation_date_time))
            .with_child(message("messageID").with_text(&self.ids.message_id))
            .with_child(recipient)
            .with_child(payload_element)
            .with_child(sender);
        push.namespaces = declarations;
        push
    }
}

fn message(local: &str) -> Element {
    Element::new(QName::namespaced(eudamed::MESSAGE, local)).with_prefix("m")
}

fn service(local: &str) -> Element {
    Element::new(QName::namespaced(eudamed::SERVICE, local)).with_prefix("s")
}
