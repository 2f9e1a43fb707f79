//! Keyed, ordered store of live chart instances plus the card height rule.

use std::error::Error;
use std::fmt;

use crate::chart::instance::{ChartEnv, ChartInstance, InstanceConfig};
use crate::config::CHART;
use crate::utils::app_time::AppInstant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingKey,
    MissingContainerId,
    DuplicateKey(String),
    UnknownKey(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::MissingKey => write!(f, "Chart config is missing a key"),
            ConfigError::MissingContainerId => write!(f, "Chart config is missing a container id"),
            ConfigError::DuplicateKey(key) => write!(f, "A chart with key '{}' already exists", key),
            ConfigError::UnknownKey(key) => write!(f, "No chart with key '{}'", key),
        }
    }
}

impl Error for ConfigError {}

/// Card height for `count` charts in a viewport of `viewport_height` pixels.
pub fn target_height(count: usize, viewport_height: f32) -> f32 {
    let layout = &CHART.layout;
    let height = match count {
        0 | 1 => viewport_height - layout.single_chart_chrome_px,
        2 => (viewport_height - layout.two_chart_chrome_px) / 2.0,
        _ => layout.multi_chart_height_px,
    };
    height.max(layout.min_chart_height_px)
}

pub struct ChartRegistry {
    env: ChartEnv,
    instances: Vec<ChartInstance>,
    viewport_height: f32,
}

impl ChartRegistry {
    pub fn new(env: ChartEnv) -> Self {
        Self {
            env,
            instances: Vec::new(),
            viewport_height: CHART.layout.default_viewport_height_px,
        }
    }

    /// Validates, constructs, registers and starts loading a chart, then re-runs the height rule.
    pub fn create(&mut self, config: InstanceConfig) -> Result<&mut ChartInstance, ConfigError> {
        if config.key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }
        if config.container_id.trim().is_empty() {
            return Err(ConfigError::MissingContainerId);
        }
        if self.get(&config.key).is_some() {
            return Err(ConfigError::DuplicateKey(config.key));
        }

        let height = target_height(self.instances.len() + 1, self.viewport_height);
        let mut instance = ChartInstance::new(config, self.env.clone(), height);
        instance.init();
        log::info!("Registered chart '{}' ({})", instance.key(), instance.symbol());
        self.instances.push(instance);
        self.resize_all();

        let last = self.instances.len() - 1;
        Ok(&mut self.instances[last])
    }

    pub fn get(&self, key: &str) -> Option<&ChartInstance> {
        self.instances.iter().find(|i| i.key() == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ChartInstance> {
        self.instances.iter_mut().find(|i| i.key() == key)
    }

    /// Moves a chart to a new key, keeping its place in the order.
    pub fn rekey(&mut self, key: &str, new_key: &str) -> Result<(), ConfigError> {
        if new_key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }
        if key == new_key {
            return Ok(());
        }
        if self.get(new_key).is_some() {
            return Err(ConfigError::DuplicateKey(new_key.to_string()));
        }
        let instance = self
            .get_mut(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        instance.rekey(new_key);
        Ok(())
    }

    /// Tears the chart down and forgets it. Returns `false` for an unknown key.
    pub fn destroy(&mut self, key: &str) -> bool {
        let Some(position) = self.instances.iter().position(|i| i.key() == key) else {
            return false;
        };
        let mut instance = self.instances.remove(position);
        instance.destroy();
        self.resize_all();
        true
    }

    /// Applies the height rule. Only the one and two chart layouts are resized, and only
    /// instances whose height differs from the target are touched. Returns how many changed.
    pub fn resize_all(&mut self) -> usize {
        let count = self.instances.len();
        if count == 0 || count >= 3 {
            return 0;
        }
        let target = target_height(count, self.viewport_height);
        let mut changed = 0;
        for instance in self.instances.iter_mut() {
            if (instance.height() - target).abs() > f32::EPSILON {
                let before = instance.height();
                instance.set_height(target);
                if (instance.height() - before).abs() > f32::EPSILON {
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        if (self.viewport_height - height).abs() < 0.5 {
            return;
        }
        self.viewport_height = height;
        self.resize_all();
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    /// Polls every instance. `true` while any of them still has work pending.
    pub fn poll_all(&mut self, now: AppInstant) -> bool {
        let mut pending = false;
        for instance in self.instances.iter_mut() {
            pending |= instance.poll(now);
        }
        pending
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartInstance> {
        self.instances.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChartInstance> {
        self.instances.iter_mut()
    }

    pub fn keys(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.key().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
