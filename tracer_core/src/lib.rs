#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core line-following logic (hardware-agnostic).
//!
//! All hardware interactions go through the `tracer_traits` capability traits
//! (`LineSensors`, `HBridge`, `AudioSink`) and the injected `Clock`.
//!
//! ## Architecture
//!
//! - **Edge inputs**: debounced counters and one-shots shared with interrupt
//!   context through a fixed `EdgeTable` (`edge` module)
//! - **Estimation**: weighted position with short memory (`estimator` module)
//! - **Control**: PID regulator and differential drive (`pid`, `drive`)
//! - **Odometry**: encoder ticks, wheel speeds and pivot targets (`odometry`)
//! - **Navigation**: the state machine (`navigator`, `state`)
//! - **Loop**: paced runner with operator commands (`runner`, `command`)

pub mod builder;
pub mod command;
pub mod config;
pub mod conversions;
pub mod drive;
pub mod edge;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod mocks;
pub mod navigator;
pub mod odometry;
pub mod pid;
pub mod runner;
pub mod state;
pub mod util;

pub use builder::{DynNavigator, Missing, NavigatorBuilder, Set, build_navigator};
pub use command::{Command, Reply};
pub use config::NavigatorCfg;
pub use drive::{DifferentialDrive, WheelCommand};
pub use edge::{DebouncedEdgeInput, EdgeConfig, EdgeHandle, EdgeMode, EdgeTable};
pub use error::{BuildError, NavError, Result};
pub use estimator::{CalibrationReport, PositionEstimator};
pub use navigator::{Navigator, SharedClock};
pub use odometry::Odometry;
pub use pid::{PidGains, PidRegulator};
pub use state::{RobotState, TurnDirection, TurnIntent};
