//! Edge connection & streaming controller
//!
//! Connection status follows the transport's connection-changed callback,
//! registered once at construction; controller calls only request
//! transitions. While streaming is enabled, a store subscription forwards
//! the best current prediction as `"{name}:{percent}%"` to the device on
//! every commit. Churn is bounded by the inference commit throttle.

use crate::backends::{ConfirmRequest, DeviceTransport, UserPrompts};
use crate::inference::InferenceController;
use crate::session::{
    DeviceInfo, EdgeStatus, InferenceStatus, SessionSnapshot, SessionStore,
};
use crate::{ProtegeError, Result};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub struct EdgeController {
    store: Arc<SessionStore>,
    transport: Arc<dyn DeviceTransport>,
    inference: Arc<InferenceController>,
    prompts: Arc<dyn UserPrompts>,
}

impl EdgeController {
    /// Build the controller and register the transport callback plus the
    /// streaming subscription.
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn DeviceTransport>,
        inference: Arc<InferenceController>,
        prompts: Arc<dyn UserPrompts>,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            store,
            transport,
            inference,
            prompts,
        });

        // Single writer of Connected/Disconnected: hardware events land
        // here regardless of which controller call triggered them. Weak
        // store reference: the transport may outlive the store.
        {
            let weak_store: Weak<SessionStore> = Arc::downgrade(&controller.store);
            controller
                .transport
                .on_connection_changed(Box::new(move |event| {
                    let Some(store) = weak_store.upgrade() else {
                        return;
                    };
                    debug!(device = %event.device.id, connected = event.connected, "connection changed");
                    if event.connected {
                        store.set_edge_device(Some(event.device.clone()));
                        store.set_edge_status(EdgeStatus::Connected, None);
                    } else {
                        store.set_edge_device(None);
                        store.set_edge_status(EdgeStatus::Disconnected, None);
                    }
                }));
        }

        // Streaming fan-out. Weak store reference: the store owns this
        // subscription, so a strong reference would leak the store.
        {
            let weak_store: Weak<SessionStore> = Arc::downgrade(&controller.store);
            let transport = Arc::clone(&controller.transport);
            controller.store.subscribe(move |snapshot| {
                let Some(payload) = streaming_payload(snapshot) else {
                    return;
                };
                if let Err(e) = transport.write(payload.as_bytes()) {
                    warn!(error = %e, "device write failed, disabling streaming");
                    if let Some(store) = weak_store.upgrade() {
                        // Streaming goes off first so these commits cannot
                        // re-trigger a write.
                        store.set_streaming(false);
                        store.set_edge_status(EdgeStatus::Error, Some(e.to_string()));
                    }
                }
            });
        }

        controller
    }

    /// Connect to a device. Tears down any existing connection to a
    /// different device first; short-circuits when the transport already
    /// reports this device connected. The Connected transition itself
    /// arrives through the connection-changed callback.
    pub fn connect(&self, device_id: &str) -> Result<()> {
        let snapshot = self.store.state();

        if snapshot.edge.status == EdgeStatus::Connected {
            match &snapshot.edge.device_info {
                Some(info) if info.id == device_id => return Ok(()),
                _ => {
                    info!(%device_id, "tearing down existing connection first");
                    self.store.set_streaming(false);
                    if let Err(e) = self.transport.disconnect() {
                        warn!(error = %e, "disconnect before reconnect failed");
                    }
                }
            }
        }

        self.store.set_selected_device(Some(device_id.to_string()));

        if self.transport.is_connected(device_id) {
            debug!(%device_id, "transport already connected, short-circuiting");
            self.store.set_edge_device(Some(DeviceInfo {
                id: device_id.to_string(),
                name: device_id.to_string(),
            }));
            self.store.set_edge_status(EdgeStatus::Connected, None);
            return Ok(());
        }

        self.store.set_edge_status(EdgeStatus::Connecting, None);
        match self.transport.connect(device_id) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(%device_id, error = %e, "connect failed");
                self.store
                    .set_edge_status(EdgeStatus::Error, Some(e.to_string()));
                Err(ProtegeError::DeviceError(e.to_string()))
            }
        }
    }

    /// Disconnect from the device. A running inference loop is stopped
    /// first, behind a confirmation; declining keeps the connection.
    pub fn disconnect(&self) -> Result<()> {
        let snapshot = self.store.state();

        if snapshot.inference.status == InferenceStatus::Running {
            let request = ConfirmRequest {
                title: "Stop inference?".into(),
                message: "Disconnecting the device stops the running inference loop.".into(),
                destructive: false,
            };
            if !self.prompts.confirm(&request) {
                return Ok(());
            }
            self.inference.stop();
        }

        self.store.set_streaming(false);
        match self.transport.disconnect() {
            Ok(()) => {
                info!("device disconnect requested");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "disconnect failed");
                self.store
                    .set_edge_status(EdgeStatus::Error, Some(e.to_string()));
                Err(ProtegeError::DeviceError(e.to_string()))
            }
        }
    }

    /// Toggle forwarding of the best live prediction to the device.
    pub fn set_streaming(&self, enabled: bool) {
        self.store.set_streaming(enabled);
    }
}

/// Payload forwarded to the device when streaming conditions hold:
/// the best class name and its confidence as a rounded percentage.
fn streaming_payload(snapshot: &SessionSnapshot) -> Option<String> {
    if !snapshot.inference.stream_to_edge {
        return None;
    }
    if snapshot.edge.status != EdgeStatus::Connected {
        return None;
    }
    if snapshot.inference.status != InferenceStatus::Running {
        return None;
    }
    let prediction = snapshot.inference.last_prediction.as_ref()?;
    let class = snapshot.classes.get(prediction.best_index)?;
    let percent = (prediction.best_value() * 100.0).round() as i64;
    Some(format!("{}:{}%", class.name, percent))
}
