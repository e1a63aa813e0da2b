//! One-beacon-at-a-time acquisition.
//!
//! Exactly one slot topic is subscribed at any moment. Each pass of the
//! control loop looks at the newest payload in the inbox; a usable reading
//! for the awaited slot is drawn into its column and the subscription moves
//! on to the next slot. After the last slot the sequencer is done for the
//! wake cycle.
//!
//! There is no timeout: a beacon that never publishes keeps the sequencer
//! waiting on its slot until something outside the core resets the device.

use embedded_graphics::prelude::DrawTarget;
use epd_waveshare::color::Color;
use heapless::{String, Vec};
use log::{debug, info, warn};

use crate::config::{PAYLOAD_CAPACITY, STRING_LEN, Text};
use crate::decoder;
use crate::error::Error;
use crate::model::{BeaconSlot, SLOT_COUNT};
use crate::render;
use crate::traits::MessageBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    WaitingForSlot(usize),
    Done,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing usable yet for this slot.
    Waiting(usize),
    /// This slot was drawn and the next one subscribed.
    Captured(usize),
    /// The last slot was drawn on this tick.
    Completed,
    /// Already finished earlier in the wake cycle.
    Done,
}

#[derive(Debug, Default)]
pub struct Message {
    pub topic: String<STRING_LEN>,
    pub payload: Vec<u8, PAYLOAD_CAPACITY>,
}

/// Single-slot buffer between the bus callback and the next tick.
/// A newer message replaces an unconsumed older one.
#[derive(Debug, Default)]
pub struct Inbox {
    message: Option<Message>,
}

impl Inbox {
    /// Returns false when the message does not fit and was dropped.
    pub fn store(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Ok(topic) = String::try_from(topic) else {
            warn!("dropping message: topic longer than {} bytes", STRING_LEN);
            return false;
        };
        let Ok(payload) = Vec::from_slice(payload) else {
            warn!(
                "dropping message on '{}': {} bytes exceeds {}",
                topic,
                payload.len(),
                PAYLOAD_CAPACITY
            );
            return false;
        };
        self.message = Some(Message { topic, payload });
        true
    }

    pub fn take(&mut self) -> Option<Message> {
        self.message.take()
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }
}

pub struct Sequencer {
    slots: [BeaconSlot; SLOT_COUNT],
    state: AcquisitionState,
    inbox: Inbox,
}

impl Sequencer {
    pub fn new(topics: &[Text; SLOT_COUNT]) -> Self {
        Self {
            slots: BeaconSlot::table(topics),
            state: AcquisitionState::WaitingForSlot(0),
            inbox: Inbox::default(),
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn slots(&self) -> &[BeaconSlot; SLOT_COUNT] {
        &self.slots
    }

    pub fn current_topic(&self) -> Option<&str> {
        match self.state {
            AcquisitionState::WaitingForSlot(index) => Some(&self.slots[index].topic),
            AcquisitionState::Done => None,
        }
    }

    /// (Re)subscribes to the awaited slot, e.g. after the broker connection
    /// was established or restored.
    pub async fn subscribe_current<B: MessageBus>(&mut self, bus: &mut B) -> Result<(), Error> {
        if let Some(topic) = self.current_topic() {
            info!("subscribing to '{}'", topic);
            bus.subscribe(topic).await?;
        }
        Ok(())
    }

    /// Bus callback: keep the newest payload for the next tick.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        if self.state == AcquisitionState::Done {
            debug!("ignoring message on '{}' after completion", topic);
            return;
        }
        self.inbox.store(topic, payload);
    }

    pub async fn tick<B, D>(&mut self, bus: &mut B, frame: &mut D) -> Result<Step, Error>
    where
        B: MessageBus,
        D: DrawTarget<Color = Color>,
    {
        let index = match self.state {
            AcquisitionState::Done => return Ok(Step::Done),
            AcquisitionState::WaitingForSlot(index) => index,
        };

        let Some(message) = self.inbox.take() else {
            return Ok(Step::Waiting(index));
        };

        let slot = &self.slots[index];
        if !slot.accepts(&message.topic) {
            warn!(
                "{}: '{}' while waiting for slot {} on '{}'",
                Error::TopicMismatch,
                message.topic,
                index,
                slot.topic
            );
            return Ok(Step::Waiting(index));
        }

        let Some(reading) = decoder::decode(&message.payload) else {
            return Ok(Step::Waiting(index));
        };

        info!(
            "slot {}: {} [{}] {:.2} C {:.2} % {:.2} hPa {:.2} V",
            index,
            reading.name,
            reading.mac_address,
            reading.temperature_c,
            reading.humidity_pct,
            reading.pressure_hpa(),
            reading.battery_voltage_v
        );
        render::draw_reading(frame, &reading, slot.origin_x);

        let next = index + 1;
        if next < SLOT_COUNT {
            // Advance first so a reconnect re-subscribes the right slot
            self.state = AcquisitionState::WaitingForSlot(next);
            bus.unsubscribe(&self.slots[index].topic).await?;
            bus.subscribe(&self.slots[next].topic).await?;
            info!("waiting for slot {} on '{}'", next, self.slots[next].topic);
            Ok(Step::Captured(index))
        } else {
            self.state = AcquisitionState::Done;
            info!("all {} beacons captured", SLOT_COUNT);
            Ok(Step::Completed)
        }
    }
}
