//! Device protocol: property vocabulary and the binding state machine
//!
//! - **props**: the property-code vocabulary shared by status polls and
//!   commands, plus typed values and the `StatePatch` builder
//! - **state**: the scan → bind → poll state machine that owns device
//!   identity, session key and the last known property values

pub mod props;
pub mod state;

pub use props::{FanSpeed, Mode, StatePatch, VerticalSwing};
pub use state::{BindingState, DeviceIdentity, DeviceSnapshot, DeviceStateMachine, Inbound};
