//! Chart engine: instances, their registry, and the pieces they are built from.

pub mod axis;
pub mod instance;
pub mod registry;
pub mod series;
pub mod tasks;
pub mod widget;

pub use axis::{AxisBounds, AxisLimits, XWindow};
pub use instance::{
    ChartEnv, ChartEvent, ChartInstance, InstanceConfig, InstanceState, OhlcLabel, PrefetchStart,
};
pub use registry::{ChartRegistry, ConfigError};
pub use series::{SeriesData, SeriesDef, SeriesKind};
pub use tasks::TaskRunner;
pub use widget::{ChartOverrides, ChartStyle, ChartWidget, OptionsUpdate, StyleOverrides, WidgetOptions};
