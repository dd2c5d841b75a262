use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::config::ThrottleSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Request,
    Image,
    Entity,
}

pub trait Throttle: Send + Sync {
    fn pause(&self, kind: Pause);
}

#[derive(Debug, Clone)]
pub struct FixedDelay {
    request: Duration,
    image: Duration,
    entity: Duration,
}

impl FixedDelay {
    pub fn new(settings: &ThrottleSettings) -> Self {
        Self {
            request: settings.request_delay,
            image: settings.image_delay,
            entity: settings.entity_delay,
        }
    }

    pub fn delay_for(&self, kind: Pause) -> Duration {
        match kind {
            Pause::Request => self.request,
            Pause::Image => self.image,
            Pause::Entity => self.entity,
        }
    }
}

impl Throttle for FixedDelay {
    fn pause(&self, kind: Pause) {
        let delay = self.delay_for(kind);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[derive(Debug, Default)]
pub struct NoDelay {
    pauses: Mutex<Vec<Pause>>,
}

impl NoDelay {
    pub fn pauses(&self) -> Vec<Pause> {
        self.pauses
            .lock()
            .map(|pauses| pauses.clone())
            .unwrap_or_default()
    }
}

impl Throttle for NoDelay {
    fn pause(&self, kind: Pause) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(kind);
        }
    }
}
