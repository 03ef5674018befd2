//! Pomodoro session lifecycle

pub mod ports;
pub mod service;
pub mod state_machine;
pub mod timer;

pub use ports::SessionRepository;
pub use service::SessionService;
pub use state_machine::{SessionEvent, SessionStateMachine, Transition};
pub use timer::SessionTimer;
